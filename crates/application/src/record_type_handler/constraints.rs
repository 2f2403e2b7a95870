use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use archivum_core::AppResult;
use archivum_domain::{Constraint, RecordPartConstraintMarking, RecordPartConstraints};

use super::RecordTypeHandler;
use crate::metadata_reader::{MetadataReader, child_references, is_metadata_group, name_in_data};

type ConstraintWalk<'r> = Pin<Box<dyn Future<Output = AppResult<()>> + Send + 'r>>;

impl RecordTypeHandler {
    /// Walks the metadata graph below `metadata_id` and collects every marked child.
    pub(super) async fn resolve_constraints(
        &self,
        metadata_id: &str,
    ) -> AppResult<RecordPartConstraints> {
        let mut reader = MetadataReader::new(self.storage.as_ref());
        let mut constraints = RecordPartConstraints::default();
        let mut branch = BTreeSet::from([metadata_id.to_owned()]);

        collect_constraints(&mut reader, metadata_id, &mut branch, &mut constraints).await?;

        Ok(constraints)
    }
}

/// `branch` holds the group ids on the path from the root to `metadata_id`.
fn collect_constraints<'r, 'a: 'r>(
    reader: &'r mut MetadataReader<'a>,
    metadata_id: &'r str,
    branch: &'r mut BTreeSet<String>,
    constraints: &'r mut RecordPartConstraints,
) -> ConstraintWalk<'r> {
    Box::pin(async move {
        let metadata_group = reader.read(metadata_id).await?;

        for reference in child_references(&metadata_group)? {
            let marking = reference
                .record_part_constraint
                .as_deref()
                .map(RecordPartConstraintMarking::from_str)
                .transpose()?;

            if marking.is_none() && !reference.is_max_one() {
                continue;
            }

            let child = reader.read(reference.child_id.as_str()).await?;

            if let Some(marking) = marking {
                let mut constraint = Constraint::new(name_in_data(&child)?);
                for (attribute_name, values) in reader.attribute_filters(&child).await? {
                    constraint = constraint.with_attribute(attribute_name, values);
                }
                constraints.add(constraint, marking);
            }

            // Repeated containers cannot be expressed as one flat constraint key.
            if is_metadata_group(&child)
                && reference.is_max_one()
                && branch.insert(reference.child_id.clone())
            {
                collect_constraints(reader, reference.child_id.as_str(), branch, constraints)
                    .await?;
                branch.remove(reference.child_id.as_str());
            }
        }

        Ok(())
    })
}
