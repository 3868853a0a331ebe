//! Configuration merge logic
//!
//! Fills unset fields from a fallback record:
//! - Unset (`None`) fields take the fallback's value
//! - Set fields are kept, including explicitly empty lists and strings
//! - Nested records merge field by field

/// A record whose unset fields can be filled from a fallback of the same shape.
pub trait Merge {
    /// Fill every unset field of `self` from `fallback`.
    ///
    /// Idempotent: merging the same fallback twice equals merging it once.
    fn merge_from(&mut self, fallback: &Self);
}

/// Take `fallback`'s value when `field` is unset.
///
/// Presence decides, not the value: `Some(vec![])` stays empty.
pub fn merge_field<T: Clone>(field: &mut Option<T>, fallback: &Option<T>) {
    if field.is_none() {
        field.clone_from(fallback);
    }
}
