use crate::coords::GeoPoint;

/// A closed polygon, stored as its geographic vertices. The closing edge is implicit.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Polygon {
    vertices: Vec<GeoPoint>,
}

impl Polygon {
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
        }
    }

    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    pub fn push(&mut self, vertex: GeoPoint) {
        self.vertices.push(vertex);
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl From<Vec<GeoPoint>> for Polygon {
    fn from(vertices: Vec<GeoPoint>) -> Self {
        Self { vertices }
    }
}

impl FromIterator<GeoPoint> for Polygon {
    fn from_iter<I: IntoIterator<Item = GeoPoint>>(iter: I) -> Self {
        Self {
            vertices: iter.into_iter().collect(),
        }
    }
}

impl Extend<GeoPoint> for Polygon {
    fn extend<I: IntoIterator<Item = GeoPoint>>(&mut self, iter: I) {
        self.vertices.extend(iter);
    }
}
