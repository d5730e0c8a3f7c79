//! Boundary to the host document.
//!
//! The core only ever sees plain geometry. A host implements
//! [`HostDocumentAdapter`] to hand labels and elements in and take placements
//! and selections back. Records whose geometry could not be resolved arrive
//! with `None` and are dropped here rather than inside the algorithms.

use crate::geometry::Point2D;
use crate::layout::{Label, LayoutSession, Placement};
use crate::select::Element;
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Host-defined extent of a query ("view", "selection", ...). Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(pub String);

impl Scope {
    pub const ALL: &'static str = "all";
    pub const SELECTION: &'static str = "selection";

    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    pub fn all() -> Self {
        Self::new(Self::ALL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRecord {
    pub id: String,
    #[serde(default)]
    pub position: Option<Point2D>,
    #[serde(default)]
    pub anchor: Option<Point2D>,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub category: Option<String>,
}

impl LabelRecord {
    pub fn into_label(self) -> Option<Label> {
        let anchor = self.anchor?;
        // An unplaced label starts on its anchor.
        let position = self.position.unwrap_or(anchor);
        let label = Label::new(self.id, anchor, position).with_z(self.z);
        Some(match self.category {
            Some(category) => label.with_category(category),
            None => label,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementRecord {
    pub id: String,
    #[serde(default)]
    pub position: Option<Point2D>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub type_id: Option<String>,
}

impl ElementRecord {
    pub fn into_element(self) -> Option<Element> {
        Some(Element {
            id: self.id,
            position: self.position?,
            category: self.category,
            type_id: self.type_id,
        })
    }
}

pub trait HostDocumentAdapter {
    type Error;

    fn enumerate_labels(&self, scope: &Scope) -> Result<Vec<LabelRecord>, Self::Error>;

    /// Called once per apply with every placement of the session.
    fn write_positions(&mut self, placements: &[Placement]) -> Result<(), Self::Error>;

    fn enumerate_locatable(&self, scope: &Scope) -> Result<Vec<ElementRecord>, Self::Error>;

    fn set_selection(&mut self, ids: &[String]) -> Result<(), Self::Error>;
}

/// Labels in `scope` with resolved geometry; the rest are skipped with a warning.
pub fn collect_labels<A: HostDocumentAdapter>(
    adapter: &A,
    scope: &Scope,
) -> Result<Vec<Label>, A::Error> {
    let records = adapter.enumerate_labels(scope)?;
    let total = records.len();
    let labels: Vec<Label> = records
        .into_iter()
        .filter_map(|record| {
            let id = record.id.clone();
            let label = record.into_label();
            if label.is_none() {
                warn!(id = %id, "skipping label without an anchor");
            }
            label
        })
        .collect();
    debug!(scope = %scope, total, kept = labels.len(), "labels collected");
    Ok(labels)
}

/// Elements in `scope` with a position; the rest are skipped with a warning.
pub fn collect_elements<A: HostDocumentAdapter>(
    adapter: &A,
    scope: &Scope,
) -> Result<Vec<Element>, A::Error> {
    let records = adapter.enumerate_locatable(scope)?;
    let total = records.len();
    let elements: Vec<Element> = records
        .into_iter()
        .filter_map(|record| {
            let id = record.id.clone();
            let element = record.into_element();
            if element.is_none() {
                warn!(id = %id, "skipping element without a position");
            }
            element
        })
        .collect();
    debug!(scope = %scope, total, kept = elements.len(), "elements collected");
    Ok(elements)
}

/// Hand the session's current placements to the host. Returns how many were written.
pub fn push_positions<A: HostDocumentAdapter>(
    session: &LayoutSession,
    adapter: &mut A,
) -> Result<usize, A::Error> {
    let placements = session.apply();
    adapter.write_positions(&placements)?;
    Ok(placements.len())
}

/// File-backed document: labels, locatable elements and the current selection.
///
/// Scope `all` covers everything, `selection` covers the selected ids, and any
/// other scope is read as a category name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonDocument {
    #[serde(default)]
    pub labels: Vec<LabelRecord>,
    #[serde(default)]
    pub elements: Vec<ElementRecord>,
    #[serde(default)]
    pub selection: Vec<String>,
}

impl JsonDocument {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn in_scope(&self, scope: &Scope, id: &str, category: Option<&str>) -> bool {
        match scope.as_str() {
            "" | Scope::ALL => true,
            Scope::SELECTION => self.selection.iter().any(|s| s == id),
            other => category == Some(other),
        }
    }
}

impl HostDocumentAdapter for JsonDocument {
    type Error = anyhow::Error;

    fn enumerate_labels(&self, scope: &Scope) -> anyhow::Result<Vec<LabelRecord>> {
        Ok(self
            .labels
            .iter()
            .filter(|l| self.in_scope(scope, &l.id, l.category.as_deref()))
            .cloned()
            .collect())
    }

    fn write_positions(&mut self, placements: &[Placement]) -> anyhow::Result<()> {
        // Resolve every id before touching the document so a bad batch writes nothing.
        let updates = {
            let index: HashMap<&str, usize> = self
                .labels
                .iter()
                .enumerate()
                .map(|(i, l)| (l.id.as_str(), i))
                .collect();
            let mut updates = Vec::with_capacity(placements.len());
            for placement in placements {
                let Some(&slot) = index.get(placement.id.0.as_str()) else {
                    bail!("document has no label {}", placement.id);
                };
                updates.push((slot, placement.position, placement.z));
            }
            updates
        };
        for (slot, position, z) in updates {
            let record = &mut self.labels[slot];
            record.position = Some(position);
            record.z = z;
        }
        Ok(())
    }

    fn enumerate_locatable(&self, scope: &Scope) -> anyhow::Result<Vec<ElementRecord>> {
        Ok(self
            .elements
            .iter()
            .filter(|e| self.in_scope(scope, &e.id, e.category.as_deref()))
            .cloned()
            .collect())
    }

    fn set_selection(&mut self, ids: &[String]) -> anyhow::Result<()> {
        let known: HashSet<&str> = self.elements.iter().map(|e| e.id.as_str()).collect();
        if let Some(missing) = ids.iter().find(|id| !known.contains(id.as_str())) {
            bail!("document has no element {missing}");
        }
        self.selection = ids.to_vec();
        Ok(())
    }
}
