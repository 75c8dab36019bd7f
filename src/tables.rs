//! Ruled ("lattice") table detection.
//!
//! Table rules come from stroked lines and the sides of rectangles. They are
//! snapped onto shared coordinates, joined into continuous edges, and
//! intersected. The smallest closed boxes between intersections become
//! cells, and cells that share corners form a table.

use std::collections::{BTreeMap, HashSet};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::Rect;
use crate::layout::text_within;
use crate::logging::PDF_TABLES;
use crate::parse::{CharElement, LineElement, RectElement};

/// `None` marks a grid position covered by a merged cell.
pub type Cell = Option<String>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableSettings {
    pub snap_tolerance: f32,
    pub join_tolerance: f32,
    pub intersection_tolerance: f32,
    pub edge_min_length: f32,
    /// Horizontal gap that separates words when assembling text.
    pub x_tolerance: f32,
    /// Vertical distance within which chars share a line.
    pub y_tolerance: f32,
}

impl Default for TableSettings {
    fn default() -> Self {
        TableSettings {
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            intersection_tolerance: 3.0,
            edge_min_length: 3.0,
            x_tolerance: 3.0,
            y_tolerance: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    Vertical,
}

/// A horizontal edge has `y0 == y1`; a vertical one `x0 == x1`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    orientation: Orientation,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl Edge {
    fn horizontal(y: f32, xa: f32, xb: f32) -> Self {
        Edge {
            orientation: Orientation::Horizontal,
            x0: xa.min(xb),
            y0: y,
            x1: xa.max(xb),
            y1: y,
        }
    }

    fn vertical(x: f32, ya: f32, yb: f32) -> Self {
        Edge {
            orientation: Orientation::Vertical,
            x0: x,
            y0: ya.min(yb),
            x1: x,
            y1: ya.max(yb),
        }
    }

    fn length(&self) -> f32 {
        (self.x1 - self.x0) + (self.y1 - self.y0)
    }

    /// Extent along the edge's own direction.
    fn span(&self) -> (f32, f32) {
        match self.orientation {
            Orientation::Horizontal => (self.x0, self.x1),
            Orientation::Vertical => (self.y0, self.y1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub bbox: Rect,
    pub cells: Vec<Rect>,
    pub rows: Vec<Vec<Cell>>,
}

const AXIS_EPSILON: f32 = 1.0;

fn collect_edges(lines: &[LineElement], rects: &[RectElement], min_length: f32) -> Vec<Edge> {
    let mut edges = Vec::new();
    for l in lines {
        if (l.y0 - l.y1).abs() <= AXIS_EPSILON {
            edges.push(Edge::horizontal((l.y0 + l.y1) / 2.0, l.x0, l.x1));
        } else if (l.x0 - l.x1).abs() <= AXIS_EPSILON {
            edges.push(Edge::vertical((l.x0 + l.x1) / 2.0, l.y0, l.y1));
        }
    }
    for r in rects {
        let b = r.bbox;
        edges.push(Edge::horizontal(b.y0, b.x0, b.x1));
        edges.push(Edge::horizontal(b.y1, b.x0, b.x1));
        edges.push(Edge::vertical(b.x0, b.y0, b.y1));
        edges.push(Edge::vertical(b.x1, b.y0, b.y1));
    }
    edges.retain(|e| e.length() >= min_length);
    edges
}

/// Move edges whose positions lie within `tolerance` of each other onto
/// their cluster's mean position.
fn snap(mut edges: Vec<Edge>, tolerance: f32) -> Vec<Edge> {
    let pos = |e: &Edge| match e.orientation {
        Orientation::Horizontal => e.y0,
        Orientation::Vertical => e.x0,
    };
    edges.sort_by(|a, b| pos(a).total_cmp(&pos(b)));

    let mut start = 0;
    while start < edges.len() {
        let mut end = start + 1;
        while end < edges.len() && pos(&edges[end]) - pos(&edges[end - 1]) <= tolerance {
            end += 1;
        }
        let mean = edges[start..end].iter().map(pos).sum::<f32>() / (end - start) as f32;
        for e in &mut edges[start..end] {
            match e.orientation {
                Orientation::Horizontal => {
                    e.y0 = mean;
                    e.y1 = mean;
                }
                Orientation::Vertical => {
                    e.x0 = mean;
                    e.x1 = mean;
                }
            }
        }
        start = end;
    }
    edges
}

/// Merge collinear edges that overlap or sit within `tolerance` of each other.
fn join(edges: Vec<Edge>, tolerance: f32) -> Vec<Edge> {
    let mut by_line: BTreeMap<OrderedFloat<f32>, Vec<Edge>> = BTreeMap::new();
    for e in edges {
        let key = match e.orientation {
            Orientation::Horizontal => e.y0,
            Orientation::Vertical => e.x0,
        };
        by_line.entry(OrderedFloat(key)).or_default().push(e);
    }

    let mut joined = Vec::new();
    for (_, mut group) in by_line {
        group.sort_by(|a, b| a.span().0.total_cmp(&b.span().0));
        let mut current = group[0];
        for e in group.into_iter().skip(1) {
            if e.span().0 <= current.span().1 + tolerance {
                match current.orientation {
                    Orientation::Horizontal => current.x1 = current.x1.max(e.x1),
                    Orientation::Vertical => current.y1 = current.y1.max(e.y1),
                }
            } else {
                joined.push(current);
                current = e;
            }
        }
        joined.push(current);
    }
    joined
}

type Point = (OrderedFloat<f32>, OrderedFloat<f32>);

#[derive(Debug, Default)]
struct Intersection {
    vertical: HashSet<usize>,
    horizontal: HashSet<usize>,
}

fn intersections(edges: &[Edge], tolerance: f32) -> BTreeMap<Point, Intersection> {
    let mut points: BTreeMap<Point, Intersection> = BTreeMap::new();
    for (vi, v) in edges.iter().enumerate() {
        if v.orientation != Orientation::Vertical {
            continue;
        }
        for (hi, h) in edges.iter().enumerate() {
            if h.orientation != Orientation::Horizontal {
                continue;
            }
            if v.y0 <= h.y0 + tolerance
                && v.y1 >= h.y0 - tolerance
                && v.x0 >= h.x0 - tolerance
                && v.x0 <= h.x1 + tolerance
            {
                let entry = points.entry((OrderedFloat(v.x0), OrderedFloat(h.y0))).or_default();
                entry.vertical.insert(vi);
                entry.horizontal.insert(hi);
            }
        }
    }
    points
}

fn connected(points: &BTreeMap<Point, Intersection>, a: &Point, b: &Point) -> bool {
    let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) else {
        return false;
    };
    if a.0 == b.0 {
        !pa.vertical.is_disjoint(&pb.vertical)
    } else if a.1 == b.1 {
        !pa.horizontal.is_disjoint(&pb.horizontal)
    } else {
        false
    }
}

/// The smallest closed box whose top-left corner is each intersection.
fn cells(points: &BTreeMap<Point, Intersection>) -> Vec<Rect> {
    let mut ordered: Vec<Point> = points.keys().copied().collect();
    ordered.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));

    let mut found = Vec::new();
    for p in &ordered {
        let below: Vec<&Point> = ordered.iter().filter(|q| q.0 == p.0 && q.1 > p.1).collect();
        let right: Vec<&Point> = ordered.iter().filter(|q| q.1 == p.1 && q.0 > p.0).collect();

        'search: for b in &below {
            if !connected(points, p, b) {
                continue;
            }
            for r in &right {
                if !connected(points, p, r) {
                    continue;
                }
                let corner = (r.0, b.1);
                if connected(points, &corner, r) && connected(points, &corner, b) {
                    found.push(Rect::new(p.0 .0, p.1 .0, corner.0 .0, corner.1 .0));
                    break 'search;
                }
            }
        }
    }
    found
}

fn corners(r: &Rect) -> [Point; 4] {
    [
        (OrderedFloat(r.x0), OrderedFloat(r.y0)),
        (OrderedFloat(r.x1), OrderedFloat(r.y0)),
        (OrderedFloat(r.x0), OrderedFloat(r.y1)),
        (OrderedFloat(r.x1), OrderedFloat(r.y1)),
    ]
}

/// Partition cells into tables of cells connected through shared corners.
fn group_cells(cells: Vec<Rect>) -> Vec<Vec<Rect>> {
    let mut remaining = cells;
    let mut tables = Vec::new();

    while let Some(seed) = remaining.pop() {
        let mut table = vec![seed];
        let mut table_corners: HashSet<Point> = corners(&seed).into_iter().collect();
        loop {
            let before = table.len();
            let mut i = 0;
            while i < remaining.len() {
                if corners(&remaining[i]).iter().any(|c| table_corners.contains(c)) {
                    let cell = remaining.swap_remove(i);
                    table_corners.extend(corners(&cell));
                    table.push(cell);
                } else {
                    i += 1;
                }
            }
            if table.len() == before {
                break;
            }
        }
        tables.push(table);
    }
    tables
}

fn build_table(mut cells: Vec<Rect>, chars: &[CharElement], settings: &TableSettings) -> Table {
    cells.sort_by(|a, b| (OrderedFloat(a.y0), OrderedFloat(a.x0)).cmp(&(OrderedFloat(b.y0), OrderedFloat(b.x0))));

    let columns: Vec<OrderedFloat<f32>> = {
        let mut xs: Vec<_> = cells.iter().map(|c| OrderedFloat(c.x0)).collect();
        xs.sort();
        xs.dedup();
        xs
    };

    let mut rows: BTreeMap<OrderedFloat<f32>, Vec<&Rect>> = BTreeMap::new();
    for c in &cells {
        rows.entry(OrderedFloat(c.y0)).or_default().push(c);
    }

    let rows = rows
        .values()
        .map(|row_cells| {
            columns
                .iter()
                .map(|x| {
                    row_cells
                        .iter()
                        .find(|c| OrderedFloat(c.x0) == *x)
                        .map(|c| text_within(chars, c, settings.x_tolerance, settings.y_tolerance))
                })
                .collect()
        })
        .collect();

    let bbox = cells
        .iter()
        .copied()
        .reduce(|acc, c| acc.union(&c))
        .unwrap_or_default();

    Table { bbox, cells, rows }
}

/// Find ruled tables on a page, ordered top to bottom.
pub fn find_tables(
    lines: &[LineElement],
    rects: &[RectElement],
    chars: &[CharElement],
    settings: &TableSettings,
) -> Vec<Table> {
    let edges = collect_edges(lines, rects, settings.edge_min_length);
    let (horizontal, vertical): (Vec<Edge>, Vec<Edge>) = edges
        .into_iter()
        .partition(|e| e.orientation == Orientation::Horizontal);
    if horizontal.len() < 2 || vertical.len() < 2 {
        return Vec::new();
    }

    let mut edges = join(snap(horizontal, settings.snap_tolerance), settings.join_tolerance);
    edges.extend(join(snap(vertical, settings.snap_tolerance), settings.join_tolerance));

    let points = intersections(&edges, settings.intersection_tolerance);
    let cells = cells(&points);

    let mut tables: Vec<Table> = group_cells(cells)
        .into_iter()
        .filter(|t| t.len() > 1)
        .map(|t| build_table(t, chars, settings))
        .collect();
    tables.sort_by(|a, b| (OrderedFloat(a.bbox.y0), OrderedFloat(a.bbox.x0)).cmp(&(OrderedFloat(b.bbox.y0), OrderedFloat(b.bbox.x0))));

    debug!(target: PDF_TABLES, edges = edges.len(), intersections = points.len(), tables = tables.len(), "lattice search done");
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hline(y: f32, x0: f32, x1: f32) -> LineElement {
        LineElement { x0, y0: y, x1, y1: y }
    }

    fn vline(x: f32, y0: f32, y1: f32) -> LineElement {
        LineElement { x0: x, y0, x1: x, y1 }
    }

    fn word(text: &str, x: f32, top: f32) -> Vec<CharElement> {
        text.chars()
            .enumerate()
            .map(|(i, c)| CharElement {
                text: c.to_string(),
                font_name: "Helvetica".to_string(),
                size: 10.0,
                bbox: Rect::new(x + i as f32 * 5.0, top, x + (i + 1) as f32 * 5.0, top + 10.0),
            })
            .collect()
    }

    /// Two columns (100..200, 200..300), two rows (100..120, 120..140).
    fn grid_lines() -> Vec<LineElement> {
        vec![
            hline(100.0, 100.0, 300.0),
            hline(120.0, 100.0, 300.0),
            hline(140.0, 100.0, 300.0),
            vline(100.0, 100.0, 140.0),
            vline(200.0, 100.0, 140.0),
            vline(300.0, 100.0, 140.0),
        ]
    }

    #[test]
    fn finds_two_by_two_grid() {
        let mut chars = word("Owner", 110.0, 105.0);
        chars.extend(word("Area", 210.0, 105.0));
        chars.extend(word("Ramesh", 110.0, 125.0));

        let tables = find_tables(&grid_lines(), &[], &chars, &TableSettings::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].rows,
            vec![
                vec![Some("Owner".to_string()), Some("Area".to_string())],
                vec![Some("Ramesh".to_string()), Some(String::new())],
            ]
        );
        assert_eq!(tables[0].bbox, Rect::new(100.0, 100.0, 300.0, 140.0));
    }

    #[test]
    fn slightly_misaligned_rules_snap_together() {
        let mut lines = grid_lines();
        lines[1] = hline(121.5, 100.0, 300.0);
        lines.push(hline(120.0, 100.0, 150.0));
        let tables = find_tables(&lines, &[], &[], &TableSettings::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells.len(), 4);
    }

    #[test]
    fn rectangles_form_cells() {
        let rects = vec![
            RectElement { bbox: Rect::new(0.0, 0.0, 50.0, 20.0) },
            RectElement { bbox: Rect::new(50.0, 0.0, 100.0, 20.0) },
        ];
        let tables = find_tables(&[], &rects, &[], &TableSettings::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 1);
        assert_eq!(tables[0].rows[0].len(), 2);
    }

    #[test]
    fn merged_cell_leaves_none() {
        // Header spans both columns; the divider only exists in the body row.
        let lines = vec![
            hline(100.0, 100.0, 300.0),
            hline(120.0, 100.0, 300.0),
            hline(140.0, 100.0, 300.0),
            vline(100.0, 100.0, 140.0),
            vline(200.0, 120.0, 140.0),
            vline(300.0, 100.0, 140.0),
        ];
        let tables = find_tables(&lines, &[], &[], &TableSettings::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[0], vec![Some(String::new()), None]);
        assert_eq!(tables[0].rows[1].len(), 2);
    }

    #[test]
    fn lone_box_is_not_a_table() {
        let rects = vec![RectElement { bbox: Rect::new(0.0, 0.0, 50.0, 20.0) }];
        assert!(find_tables(&[], &rects, &[], &TableSettings::default()).is_empty());
    }

    #[test]
    fn unruled_page_has_no_tables() {
        let chars = word("Survey", 10.0, 10.0);
        assert!(find_tables(&[], &[], &chars, &TableSettings::default()).is_empty());
    }
}
