use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::InvalidTemplate;
use crate::tiles::TileKey;

/// A tile URL template, parsed once so building a URL per tile is just a few pushes.
///
/// Placeholders are `{x}`, `{y}` and `{z}`, and all three must be present:
/// ```
/// # use slippy_map::{TileKey, UrlTemplate};
/// let template: UrlTemplate = "https://tile.example.com/{z}/{x}/{y}.png".parse().unwrap();
/// let url = template.complete_url(TileKey::normalized(-1, 2, 3));
/// assert_eq!(url, "https://tile.example.com/3/7/2.png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: Arc<str>,
    parts: Vec<Part>,
    literal_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(Range<usize>),
    X,
    Y,
    Z,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self, InvalidTemplate> {
        let mut parts = Vec::with_capacity(7);
        let mut literal_len = 0;
        let mut seen = [false; 3];

        let mut rest_start = 0;

        while let Some(open_offset) = template[rest_start..].find('{') {
            let open = rest_start + open_offset;

            let close = match template[open..].find('}') {
                Some(close_offset) => open + close_offset,
                None => return Err(InvalidTemplate::Unterminated(open)),
            };

            if open > rest_start {
                literal_len += open - rest_start;
                parts.push(Part::Literal(rest_start..open));
            }

            let (part, index) = match &template[open + 1..close] {
                "x" => (Part::X, 0),
                "y" => (Part::Y, 1),
                "z" => (Part::Z, 2),
                unknown => return Err(InvalidTemplate::UnknownPlaceholder(unknown.to_owned())),
            };

            seen[index] = true;
            parts.push(part);
            rest_start = close + 1;
        }

        if rest_start < template.len() {
            literal_len += template.len() - rest_start;
            parts.push(Part::Literal(rest_start..template.len()));
        }

        for (seen, name) in seen.into_iter().zip(['x', 'y', 'z']) {
            if !seen {
                return Err(InvalidTemplate::MissingPlaceholder(name));
            }
        }

        Ok(Self {
            template: Arc::from(template),
            parts,
            literal_len,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn complete_url(&self, key: TileKey) -> String {
        let mut buf = itoa::Buffer::new();

        let mut capacity = self.literal_len;
        for part in self.parts.iter() {
            capacity += match part {
                Part::Literal(_) => 0,
                Part::X => crate::n_digits(key.x()),
                Part::Y => crate::n_digits(key.y()),
                Part::Z => crate::n_digits(key.zoom() as u32),
            };
        }

        let mut dst = String::with_capacity(capacity);

        for part in self.parts.iter() {
            match part {
                Part::Literal(range) => dst.push_str(&self.template[range.clone()]),
                Part::X => dst.push_str(buf.format(key.x())),
                Part::Y => dst.push_str(buf.format(key.y())),
                Part::Z => dst.push_str(buf.format(key.zoom())),
            }
        }

        debug_assert_eq!(
            dst.len(),
            capacity,
            "slippy_map::util::UrlTemplate capacity math is off"
        );

        dst
    }
}

impl FromStr for UrlTemplate {
    type Err = InvalidTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
