//! Datastore and destination selection
//!
//! Narrows the configured datastores down to the ones a command should act
//! on. Filtering is by exact name:
//! 1. Empty store filter: every datastore is a candidate
//! 2. Empty destination filter: every destination of a candidate is kept
//! 3. Candidates left with no destinations are dropped, whether or not a
//!    destination filter was given
//!
//! Output is ordered by datastore name, destinations by name within each.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{Datastore, Destination};

/// A datastore with the destinations that survived filtering
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedDatastore<'a> {
    pub datastore: &'a Datastore,
    pub destinations: Vec<&'a Destination>,
}

impl<'a> SelectedDatastore<'a> {
    pub fn name(&self) -> &'a str {
        &self.datastore.name
    }
}

/// Filter `datastores` by store and destination names.
///
/// An empty result is not an error; callers decide how to report it.
pub fn select<'a>(
    datastores: &'a BTreeMap<String, Datastore>,
    store_names: &[String],
    dest_names: &[String],
) -> Vec<SelectedDatastore<'a>> {
    let selected: Vec<SelectedDatastore<'a>> = datastores
        .iter()
        .filter(|(name, _)| store_names.is_empty() || store_names.contains(name))
        .filter_map(|(_, store)| {
            let destinations: Vec<&Destination> = store
                .destinations
                .iter()
                .filter(|(name, _)| dest_names.is_empty() || dest_names.contains(name))
                .map(|(_, dest)| dest)
                .collect();

            if destinations.is_empty() {
                return None;
            }
            Some(SelectedDatastore {
                datastore: store,
                destinations,
            })
        })
        .collect();

    debug!(
        stores = selected.len(),
        destinations = selected.iter().map(|s| s.destinations.len()).sum::<usize>(),
        "selected datastores"
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const FOUR_STORES: &str = r#"
[datastores.alfa.destinations.foo]
path = '/repos/alfa/foo'
[datastores.alfa.destinations.bar]
path = '/repos/alfa/bar'

[datastores.bravo.destinations.foo]
path = '/repos/bravo/foo'

[datastores.charlie.destinations.bar]
path = '/repos/charlie/bar'

[datastores.delta.destinations.foo]
path = '/repos/delta/foo'
[datastores.delta.destinations.bar]
path = '/repos/delta/bar'
"#;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn summary(selected: &[SelectedDatastore<'_>]) -> Vec<(String, Vec<String>)> {
        selected
            .iter()
            .map(|s| {
                (
                    s.name().to_string(),
                    s.destinations.iter().map(|d| d.name.clone()).collect(),
                )
            })
            .collect()
    }

    fn pair(store: &str, dests: &[&str]) -> (String, Vec<String>) {
        (store.to_string(), names(dests))
    }

    #[test]
    fn test_no_filters_selects_everything() {
        let config = Config::parse(FOUR_STORES).unwrap();
        let selected = select(&config.datastores, &[], &[]);
        assert_eq!(
            summary(&selected),
            vec![
                pair("alfa", &["bar", "foo"]),
                pair("bravo", &["foo"]),
                pair("charlie", &["bar"]),
                pair("delta", &["bar", "foo"]),
            ]
        );
    }

    #[test]
    fn test_store_filter_only() {
        let config = Config::parse(FOUR_STORES).unwrap();
        let selected = select(&config.datastores, &names(&["delta", "bravo"]), &[]);
        assert_eq!(
            summary(&selected),
            vec![pair("bravo", &["foo"]), pair("delta", &["bar", "foo"])]
        );
    }

    #[test]
    fn test_destination_filter_drops_empty_stores() {
        let config = Config::parse(FOUR_STORES).unwrap();
        let selected = select(&config.datastores, &[], &names(&["foo"]));
        assert_eq!(
            summary(&selected),
            vec![
                pair("alfa", &["foo"]),
                pair("bravo", &["foo"]),
                pair("delta", &["foo"]),
            ]
        );
    }

    #[test]
    fn test_both_filters() {
        let config = Config::parse(FOUR_STORES).unwrap();
        let selected = select(
            &config.datastores,
            &names(&["alfa", "charlie"]),
            &names(&["bar"]),
        );
        assert_eq!(
            summary(&selected),
            vec![pair("alfa", &["bar"]), pair("charlie", &["bar"])]
        );
    }

    #[test]
    fn test_no_match_is_empty() {
        let config = Config::parse(FOUR_STORES).unwrap();
        assert!(select(&config.datastores, &names(&["echo"]), &[]).is_empty());
        assert!(select(&config.datastores, &[], &names(&["baz"])).is_empty());
    }

    #[test]
    fn test_store_without_destinations_dropped_when_unfiltered() {
        let input = r#"
[datastores.empty]
sources = [{ path = '/x' }]

[datastores.full.destinations.d]
path = '/repos/full/d'
"#;
        let config = Config::parse(input).unwrap();
        let selected = select(&config.datastores, &[], &[]);
        assert_eq!(summary(&selected), vec![pair("full", &["d"])]);

        let only_empty = select(&config.datastores, &names(&["empty"]), &[]);
        assert!(only_empty.is_empty());
    }

    #[test]
    fn test_names_match_exactly() {
        let config = Config::parse(FOUR_STORES).unwrap();
        assert!(select(&config.datastores, &names(&["alf"]), &[]).is_empty());
        assert!(select(&config.datastores, &names(&["ALFA"]), &[]).is_empty());
    }
}
