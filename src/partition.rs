//! Polytopes and proposition-preserving partitions of a continuous state space.

use std::fmt;

/// Errors raised by geometric computations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("constraint matrix has {rows} rows but offset vector has {offsets} entries")]
    Shape { rows: usize, offsets: usize },
    #[error("polytopes of dimension {0} and {1} cannot be combined")]
    DimensionMismatch(usize, usize),
    #[error("polytope is unbounded")]
    Unbounded,
    #[error("volume of a {0}-dimensional polytope that is not an axis-aligned box is not supported")]
    Unsupported(usize),
}

/// Feasibility tolerance for point containment and clipping.
const EPSILON: f64 = 1e-10;

/// Polytope in H-representation `{ x | A x <= b }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polytope {
    a: Vec<Vec<f64>>,
    b: Vec<f64>,
}

impl Polytope {
    /// Create the polytope `{ x | a x <= b }`.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of rows of `a` and entries of `b`
    /// differ, or if the rows of `a` differ in length.
    pub fn new(a: Vec<Vec<f64>>, b: Vec<f64>) -> Result<Self, GeometryError> {
        if a.len() != b.len() {
            return Err(GeometryError::Shape {
                rows: a.len(),
                offsets: b.len(),
            });
        }
        if let Some(first) = a.first() {
            if let Some(row) = a.iter().find(|row| row.len() != first.len()) {
                return Err(GeometryError::DimensionMismatch(first.len(), row.len()));
            }
        }
        Ok(Self { a, b })
    }

    /// Axis-aligned box with the given lower and upper corner.
    pub fn from_box(lower: &[f64], upper: &[f64]) -> Self {
        let dim = lower.len().min(upper.len());
        let mut a = Vec::with_capacity(2 * dim);
        let mut b = Vec::with_capacity(2 * dim);
        for k in 0..dim {
            let mut row = vec![0.0; dim];
            row[k] = -1.0;
            a.push(row);
            b.push(-lower[k]);
            let mut row = vec![0.0; dim];
            row[k] = 1.0;
            a.push(row);
            b.push(upper[k]);
        }
        Self { a, b }
    }

    pub fn dim(&self) -> usize {
        self.a.first().map_or(0, Vec::len)
    }

    pub fn a(&self) -> &[Vec<f64>] {
        &self.a
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    /// Test if `x` satisfies every constraint up to a small tolerance.
    pub fn contains(&self, x: &[f64]) -> bool {
        self.a.iter().zip(&self.b).all(|(row, &b)| {
            let ax: f64 = row.iter().zip(x).map(|(a, x)| a * x).sum();
            ax <= b + EPSILON
        })
    }

    /// Intersection, given by the union of both constraint sets.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions differ.
    pub fn intersect(&self, other: &Polytope) -> Result<Polytope, GeometryError> {
        if !self.a.is_empty() && !other.a.is_empty() && self.dim() != other.dim() {
            return Err(GeometryError::DimensionMismatch(self.dim(), other.dim()));
        }
        let mut result = self.clone();
        result.a.extend(other.a.iter().cloned());
        result.b.extend(other.b.iter().copied());
        Ok(result)
    }

    /// Push every facet outward by `radius`.
    ///
    /// Each offset grows by `radius` times the euclidean norm of its facet
    /// normal, so the result contains every point within distance
    /// `radius` of the original polytope.
    pub fn inflate(&self, radius: f64) -> Polytope {
        let b = self
            .a
            .iter()
            .zip(&self.b)
            .map(|(row, &b)| b + radius * row.iter().map(|a| a * a).sum::<f64>().sqrt())
            .collect();
        Polytope {
            a: self.a.clone(),
            b,
        }
    }

    /// The bounds per dimension if every constraint involves a single
    /// coordinate.
    fn box_bounds(&self) -> Option<Vec<(f64, f64)>> {
        let mut bounds = vec![(f64::NEG_INFINITY, f64::INFINITY); self.dim()];
        for (row, &b) in self.a.iter().zip(&self.b) {
            let mut nonzero = row.iter().enumerate().filter(|(_, a)| a.abs() > EPSILON);
            let (k, &a) = match (nonzero.next(), nonzero.next()) {
                (Some(entry), None) => entry,
                (None, _) => {
                    if b < -EPSILON {
                        // 0 <= b is violated everywhere
                        bounds.iter_mut().for_each(|bound| *bound = (0.0, 0.0));
                    }
                    continue;
                }
                _ => return None,
            };
            let limit = b / a;
            if a > 0.0 {
                bounds[k].1 = bounds[k].1.min(limit);
            } else {
                bounds[k].0 = bounds[k].0.max(limit);
            }
        }
        Some(bounds)
    }

    /// Lebesgue measure of the polytope.
    ///
    /// # Errors
    ///
    /// Returns an error if the polytope is unbounded, or if it has three or
    /// more dimensions without being an axis-aligned box.
    pub fn volume(&self) -> Result<f64, GeometryError> {
        if let Some(bounds) = self.box_bounds() {
            let mut volume = 1.0;
            for (lower, upper) in bounds {
                if lower.is_infinite() || upper.is_infinite() {
                    if upper < lower {
                        return Ok(0.0);
                    }
                    return Err(GeometryError::Unbounded);
                }
                volume *= (upper - lower).max(0.0);
            }
            return Ok(volume);
        }
        match self.dim() {
            2 => self.area(),
            dim => Err(GeometryError::Unsupported(dim)),
        }
    }

    /// Area of a planar polytope by clipping a bounding square against
    /// every half-plane.
    fn area(&self) -> Result<f64, GeometryError> {
        const FAR: f64 = 1e6;
        let mut polygon = vec![[-FAR, -FAR], [FAR, -FAR], [FAR, FAR], [-FAR, FAR]];
        for (row, &b) in self.a.iter().zip(&self.b) {
            polygon = clip(&polygon, [row[0], row[1]], b);
            if polygon.is_empty() {
                return Ok(0.0);
            }
        }
        if polygon
            .iter()
            .any(|p| p[0].abs() >= FAR - 1.0 || p[1].abs() >= FAR - 1.0)
        {
            return Err(GeometryError::Unbounded);
        }
        let twice: f64 = polygon
            .iter()
            .zip(polygon.iter().cycle().skip(1))
            .map(|(p, q)| p[0] * q[1] - q[0] * p[1])
            .sum();
        Ok(twice.abs() / 2.0)
    }
}

/// Sutherland-Hodgman step: keep the part of `polygon` where `a x <= b`.
fn clip(polygon: &[[f64; 2]], a: [f64; 2], b: f64) -> Vec<[f64; 2]> {
    let value = |p: &[f64; 2]| a[0] * p[0] + a[1] * p[1] - b;
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, p) in polygon.iter().enumerate() {
        let q = &polygon[(i + 1) % polygon.len()];
        let (vp, vq) = (value(p), value(q));
        if vp <= EPSILON {
            out.push(*p);
        }
        if (vp < -EPSILON && vq > EPSILON) || (vp > EPSILON && vq < -EPSILON) {
            let t = vp / (vp - vq);
            out.push([p[0] + t * (q[0] - p[0]), p[1] + t * (q[1] - p[1])]);
        }
    }
    out
}

impl fmt::Display for Polytope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, b) in self.a.iter().zip(&self.b) {
            let row: Vec<String> = row.iter().map(|a| format!("{:>8.3}", a)).collect();
            writeln!(f, "|{} | x <= {:.3}", row.join(" "), b)?;
        }
        Ok(())
    }
}

/// A region of a partition: a union of polytopes labelled by the
/// propositions that hold in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub polytopes: Vec<Polytope>,
    /// Truth value of each proposition of the partition, `1` if it holds.
    pub props: Vec<u8>,
}

impl Region {
    pub fn new(name: impl Into<String>, polytopes: Vec<Polytope>, props: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            polytopes,
            props,
        }
    }

    /// Test if `x` lies in any polytope of the region.
    pub fn contains(&self, x: &[f64]) -> bool {
        self.polytopes.iter().any(|p| p.contains(x))
    }
}

/// Partition of a state space into regions that each preserve the truth
/// value of every proposition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropPreservingPartition {
    pub domain: Option<Polytope>,
    pub regions: Vec<Region>,
    pub prop_symbols: Vec<String>,
    /// `adj[i][j] != 0` if regions `i` and `j` are adjacent.
    pub adj: Vec<Vec<u8>>,
    /// `trans[i][j] != 0` if region `i` is reachable from region `j`.
    pub trans: Vec<Vec<u8>>,
}

impl PropPreservingPartition {
    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    /// Symbols of the propositions that hold in the given region.
    pub fn reg2props(&self, region: usize) -> Vec<&str> {
        self.regions
            .get(region)
            .map(|r| {
                r.props
                    .iter()
                    .zip(&self.prop_symbols)
                    .filter(|(&p, _)| p != 0)
                    .map(|(_, s)| s.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Index of the first region in which the given proposition holds.
    pub fn region_of(&self, symbol: &str) -> Option<usize> {
        let prop = self.prop_symbols.iter().position(|s| s == symbol)?;
        self.regions
            .iter()
            .position(|r| r.props.get(prop).map_or(false, |&p| p != 0))
    }

    /// Index of the first region containing the point `x`.
    pub fn find_region(&self, x: &[f64]) -> Option<usize> {
        self.regions.iter().position(|r| r.contains(x))
    }
}

impl fmt::Display for PropPreservingPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(domain) = &self.domain {
            writeln!(f, "Domain:\n{}", domain)?;
        }
        for (i, region) in self.regions.iter().enumerate() {
            writeln!(f, "Region {}, propositions: {}", i, self.reg2props(i).join(" "))?;
            for polytope in &region.polytopes {
                write!(f, "{}", polytope)?;
            }
        }
        let (label, matrix) = if !self.trans.is_empty() {
            ("Transition matrix", &self.trans)
        } else {
            ("Adjacency matrix", &self.adj)
        };
        if !matrix.is_empty() {
            writeln!(f, "{}:", label)?;
            for row in matrix {
                let row: Vec<String> = row.iter().map(u8::to_string).collect();
                writeln!(f, "{}", row.join(" "))?;
            }
        }
        Ok(())
    }
}
