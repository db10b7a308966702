//! Port type compatibility matrix
//!
//! A table of which output types may feed which input types. The table is
//! keyed by output type; each entry lists the input types it can feed.
//! Anything not listed falls back to "equal or either side is `any`".
//!
//! Both lookup directions ("which inputs accept X", "which outputs can feed
//! Y") are derived by scanning the table, never maintained separately.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::types::PortType;

static STANDARD: Lazy<CompatibilityMatrix> = Lazy::new(CompatibilityMatrix::standard);

/// Which output port types may feed which input port types
#[derive(Debug, Clone, Default)]
pub struct CompatibilityMatrix {
    /// output type -> input types it may feed
    table: HashMap<PortType, HashSet<PortType>>,
}

impl CompatibilityMatrix {
    /// An empty matrix: only the equality / `any` fallback applies
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table used by the editor.
    ///
    /// - `text`, `string` and `prompt` are synonyms
    /// - `image`, `video` and `audio` each feed a `media` input
    /// - `embedding` feeds an `array` input
    /// - `any` feeds every well-known type, and every type feeds `any`
    pub fn standard() -> Self {
        use PortType::*;

        let mut matrix = Self::new();
        matrix.declare_synonyms(&[Text, String, Prompt]);
        for media in [Image, Video, Audio] {
            matrix.allow(media, Media);
        }
        matrix.allow(Embedding, Array);
        for known in PortType::KNOWN {
            matrix.allow(known.clone(), known.clone());
            matrix.allow(known.clone(), Any);
            matrix.allow(Any, known);
        }
        matrix
    }

    /// Shared instance of [`CompatibilityMatrix::standard`]
    pub fn shared() -> &'static CompatibilityMatrix {
        &STANDARD
    }

    /// Declare that `output` may feed `input`
    pub fn allow(&mut self, output: PortType, input: PortType) {
        self.table.entry(output).or_default().insert(input);
    }

    /// Declare a group of mutually compatible types
    pub fn declare_synonyms(&mut self, group: &[PortType]) {
        for output in group {
            for input in group {
                self.allow(output.clone(), input.clone());
            }
        }
    }

    /// Can an `output`-typed port feed an `input`-typed port?
    pub fn compatible(&self, output: &PortType, input: &PortType) -> bool {
        if self
            .table
            .get(output)
            .is_some_and(|inputs| inputs.contains(input))
        {
            return true;
        }
        output == input || output.is_any() || input.is_any()
    }

    /// Input types that accept `output`, from the table plus the fallback
    pub fn accepted_inputs(&self, output: &PortType) -> Vec<PortType> {
        let mut types: Vec<PortType> = match self.table.get(output) {
            Some(inputs) => inputs.iter().cloned().collect(),
            None => Vec::new(),
        };
        for fallback in [output.clone(), PortType::Any] {
            if !types.contains(&fallback) {
                types.push(fallback);
            }
        }
        sort_types(&mut types);
        types
    }

    /// Output types that can feed `input`, found by scanning every table row
    pub fn feeding_outputs(&self, input: &PortType) -> Vec<PortType> {
        let mut types: Vec<PortType> = self
            .table
            .iter()
            .filter(|(_, inputs)| inputs.contains(input))
            .map(|(output, _)| output.clone())
            .collect();
        for fallback in [input.clone(), PortType::Any] {
            if !types.contains(&fallback) {
                types.push(fallback);
            }
        }
        sort_types(&mut types);
        types
    }

    /// Precompute, for every output type in the table, its accepted inputs.
    ///
    /// Used by drag-time marking so a pointer move does not rescan the table.
    pub fn index(&self) -> CompatibilityIndex<'_> {
        let accepted = self
            .table
            .iter()
            .map(|(output, inputs)| (output.clone(), inputs.clone()))
            .collect();
        CompatibilityIndex {
            matrix: self,
            accepted,
        }
    }
}

/// Per-output-type lookup built from a matrix
#[derive(Debug)]
pub struct CompatibilityIndex<'a> {
    matrix: &'a CompatibilityMatrix,
    accepted: HashMap<PortType, HashSet<PortType>>,
}

impl CompatibilityIndex<'_> {
    /// Same answer as [`CompatibilityMatrix::compatible`]
    pub fn compatible(&self, output: &PortType, input: &PortType) -> bool {
        match self.accepted.get(output) {
            Some(inputs) if inputs.contains(input) => true,
            _ => self.matrix.compatible(output, input),
        }
    }
}

/// Well-known tags in declaration order, custom tags alphabetically after
fn sort_types(types: &mut [PortType]) {
    types.sort_by_key(|t| {
        let rank = PortType::KNOWN
            .iter()
            .position(|k| k == t)
            .unwrap_or(PortType::KNOWN.len());
        (rank, t.as_str().to_string())
    });
}
