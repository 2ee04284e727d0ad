use std::collections::BTreeMap;

use super::errors::{DomainError, DomainResult};

pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Class index to human-readable name, as shipped with the model weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    names: BTreeMap<usize, String>,
}

impl LabelTable {
    pub fn coco() -> Self {
        Self::from_names(COCO_CLASSES)
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::<String>::into).enumerate().collect() }
    }

    /// Parses the `names` entry Ultralytics writes into exported ONNX metadata,
    /// a Python dict literal such as `{0: 'person', 1: "kid's bike"}`.
    /// Backslash escapes inside a name are honored.
    pub fn parse_ultralytics(raw: &str) -> Option<Self> {
        let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;
        let mut names = BTreeMap::new();
        let mut rest = body.trim_start();

        while !rest.is_empty() {
            let colon = rest.find(':')?;
            let index: usize = rest[..colon].trim().parse().ok()?;
            rest = rest[colon + 1..].trim_start();

            let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
            let (name, after) = read_quoted(&rest[1..], quote)?;
            names.insert(index, name);

            rest = after.trim_start();
            rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        }

        (!names.is_empty()).then_some(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Blank names count as missing.
    pub fn resolve(&self, class_index: usize) -> DomainResult<&str> {
        self.names
            .get(&class_index)
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or(DomainError::LabelResolution(class_index))
    }
}

/// Reads up to the closing `quote`, returning the unescaped text and what follows it.
fn read_quoted(s: &str, quote: char) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?.1),
            c if c == quote => return Some((out, &s[i + c.len_utf8()..])),
            c => out.push(c),
        }
    }
    None
}
