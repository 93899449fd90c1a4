//! Ingredient conflict detection for routine composition.
//!
//! Conflicts are declared one-directionally: a product lists tags, and any
//! other selected product whose category contains one of those tags is
//! reported. When both products declare each other, both warnings appear.

use shared::domain::CandidateProduct;

/// Returns one `"<A> conflicts with <B>"` line per matching tag, in selection order.
pub fn detect_conflicts(selected: &[CandidateProduct]) -> Vec<String> {
    let mut conflicts = Vec::new();

    for (index, product) in selected.iter().enumerate() {
        for tag in &product.conflicts {
            let tag = tag.trim().to_lowercase();
            if tag.is_empty() {
                continue;
            }

            let conflicting = selected
                .iter()
                .enumerate()
                .find(|(other_index, other)| {
                    *other_index != index && other.category.to_lowercase().contains(&tag)
                })
                .map(|(_, other)| other);

            if let Some(other) = conflicting {
                conflicts.push(format!("{} conflicts with {}", product.name, other.name));
            }
        }
    }

    conflicts
}

/// Warning texts declared by the selected products that have at least one conflict.
pub fn conflict_warnings(selected: &[CandidateProduct]) -> Vec<&str> {
    selected
        .iter()
        .enumerate()
        .filter(|(index, product)| {
            product.conflicts.iter().any(|tag| {
                let tag = tag.trim().to_lowercase();
                !tag.is_empty()
                    && selected.iter().enumerate().any(|(other_index, other)| {
                        other_index != *index && other.category.to_lowercase().contains(&tag)
                    })
            })
        })
        .filter_map(|(_, product)| product.warning.as_deref())
        .collect()
}
