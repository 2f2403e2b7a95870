use std::collections::BTreeSet;
use std::str::FromStr;

use archivum_core::AppError;
use serde::{Deserialize, Serialize};

/// Attribute filter distinguishing repeated fields that share a name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstraintAttribute {
    /// Attribute name.
    pub name_in_data: String,
    /// Permitted attribute values.
    pub values: BTreeSet<String>,
}

/// Field-level read or write constraint on one record part.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Constraint {
    name_in_data: String,
    attributes: Vec<ConstraintAttribute>,
}

impl Constraint {
    /// Creates a constraint without attribute filter.
    #[must_use]
    pub fn new(name_in_data: impl Into<String>) -> Self {
        Self {
            name_in_data: name_in_data.into(),
            attributes: Vec::new(),
        }
    }

    /// Adds one attribute filter. Filters stay ordered by attribute name.
    #[must_use]
    pub fn with_attribute(
        mut self,
        name_in_data: impl Into<String>,
        values: impl IntoIterator<Item = String>,
    ) -> Self {
        self.attributes.push(ConstraintAttribute {
            name_in_data: name_in_data.into(),
            values: values.into_iter().collect(),
        });
        self.attributes.sort();
        self
    }

    /// Returns the constrained field name.
    #[must_use]
    pub fn name_in_data(&self) -> &str {
        self.name_in_data.as_str()
    }

    /// Returns the attribute filters.
    #[must_use]
    pub fn attributes(&self) -> &[ConstraintAttribute] {
        &self.attributes
    }
}

/// Marking placed on a child reference limiting access to the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordPartConstraintMarking {
    /// Writing requires a record-part permission; reading is open.
    Write,
    /// Both reading and writing require a record-part permission.
    ReadWrite,
}

impl RecordPartConstraintMarking {
    /// Returns the stable metadata value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::ReadWrite => "readWrite",
        }
    }
}

impl FromStr for RecordPartConstraintMarking {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "write" => Ok(Self::Write),
            "readWrite" => Ok(Self::ReadWrite),
            _ => Err(AppError::Validation(format!(
                "unknown recordPartConstraint value '{value}'"
            ))),
        }
    }
}

/// Read and write constraint sets resolved for one metadata group.
///
/// Every read constraint is also a write constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPartConstraints {
    read: BTreeSet<Constraint>,
    write: BTreeSet<Constraint>,
}

impl RecordPartConstraints {
    /// Records one constraint according to its marking.
    pub fn add(&mut self, constraint: Constraint, marking: RecordPartConstraintMarking) {
        if marking == RecordPartConstraintMarking::ReadWrite {
            self.read.insert(constraint.clone());
        }
        self.write.insert(constraint);
    }

    /// Returns constraints that limit reading.
    #[must_use]
    pub fn read(&self) -> &BTreeSet<Constraint> {
        &self.read
    }

    /// Returns constraints that limit writing.
    #[must_use]
    pub fn write(&self) -> &BTreeSet<Constraint> {
        &self.write
    }

    /// Consumes the sets and returns only the write constraints.
    #[must_use]
    pub fn into_write(self) -> BTreeSet<Constraint> {
        self.write
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Constraint, RecordPartConstraintMarking, RecordPartConstraints};

    #[test]
    fn read_write_marking_lands_in_both_sets() {
        let mut constraints = RecordPartConstraints::default();
        constraints.add(Constraint::new("price"), RecordPartConstraintMarking::ReadWrite);
        constraints.add(Constraint::new("note"), RecordPartConstraintMarking::Write);

        assert!(constraints.read().contains(&Constraint::new("price")));
        assert!(!constraints.read().contains(&Constraint::new("note")));
        assert!(constraints.write().contains(&Constraint::new("price")));
        assert!(constraints.write().contains(&Constraint::new("note")));
    }

    #[test]
    fn attribute_order_does_not_affect_equality() {
        let left = Constraint::new("title")
            .with_attribute("lang", vec!["en".to_owned()])
            .with_attribute("type", vec!["main".to_owned()]);
        let right = Constraint::new("title")
            .with_attribute("type", vec!["main".to_owned()])
            .with_attribute("lang", vec!["en".to_owned()]);
        assert_eq!(left, right);
    }

    #[test]
    fn unknown_marking_is_rejected() {
        assert!(RecordPartConstraintMarking::from_str("read").is_err());
        assert_eq!(
            RecordPartConstraintMarking::from_str("readWrite").ok(),
            Some(RecordPartConstraintMarking::ReadWrite)
        );
    }
}
