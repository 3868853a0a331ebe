//! Effective configuration resolution
//!
//! A destination's effective [`Defaults`] are its own values, with unset
//! fields filled from its datastore, whose unset fields are in turn filled
//! from the top-level defaults:
//!
//! Destination > Datastore > global defaults
//!
//! Resolution works on copies and never modifies the [`Config`] tree.

use std::fmt;

use tracing::debug;

use crate::config::{Config, Datastore, Defaults, Destination, Merge};

/// Level of the config tree a set of defaults was resolved at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Datastore(&'a str),
    Destination { store: Option<&'a str>, name: &'a str },
}

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Datastore(name) => write!(f, "store={:?}", name),
            Scope::Destination {
                store: Some(store),
                name,
            } => write!(f, "store={:?}, destination={:?}", store, name),
            Scope::Destination { store: None, name } => write!(f, "destination={:?}", name),
        }
    }
}

/// Effective defaults for a datastore: its own merged over the global defaults.
pub fn resolve_datastore(config: &Config, store: &Datastore) -> Defaults {
    let mut effective = store.defaults.clone();
    effective.merge_from(&config.defaults);
    debug!(scope = %Scope::Datastore(&store.name), "resolved defaults");
    effective
}

/// Effective defaults for a destination.
///
/// A destination whose datastore key does not resolve in `config` keeps only
/// its own values.
pub fn resolve_destination(config: &Config, dest: &Destination) -> Defaults {
    let mut effective = dest.defaults.clone();

    if let Some(store) = config.parent_of(dest) {
        let parent = resolve_datastore(config, store);
        effective.merge_from(&parent);
    }

    let scope = Scope::Destination {
        store: dest.datastore.as_deref(),
        name: &dest.name,
    };
    debug!(%scope, "resolved defaults");
    effective
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PasswordConfig;

    fn destination<'a>(config: &'a Config, store: &str, name: &str) -> &'a Destination {
        &config.datastores[store].destinations[name]
    }

    fn template(defaults: &Defaults) -> Option<&str> {
        defaults.password_config.template.as_deref()
    }

    const LAYERED: &str = r#"
[defaults.password-config]
template = 'run_defaults'

[defaults.restic.global]
verbose = 1

[datastores.stuff.defaults.password-config]
template = 'run_stuff'

[datastores.stuff.destinations.foo]
path = 'test'

[datastores.stuff.destinations.foo.defaults.password-config]
template = 'run_foo'

[datastores.stuff.destinations.bar]
path = 'test2'
"#;

    #[test]
    fn test_destination_value_wins() {
        let config = Config::parse(LAYERED).unwrap();
        let effective = resolve_destination(&config, destination(&config, "stuff", "foo"));
        assert_eq!(template(&effective), Some("run_foo"));
        assert_eq!(effective.restic.global.verbose, Some(1));
    }

    #[test]
    fn test_datastore_value_inherited() {
        let config = Config::parse(LAYERED).unwrap();
        let effective = resolve_destination(&config, destination(&config, "stuff", "bar"));
        assert_eq!(template(&effective), Some("run_stuff"));
    }

    #[test]
    fn test_global_value_inherited() {
        let input = r#"
[defaults.password-config]
template = 'run_defaults'

[datastores.stuff.destinations.foo]
path = 'test'
"#;
        let config = Config::parse(input).unwrap();
        let effective = resolve_destination(&config, destination(&config, "stuff", "foo"));
        assert_eq!(template(&effective), Some("run_defaults"));
    }

    #[test]
    fn test_explicit_empty_template_is_final() {
        let input = r#"
[defaults.password-config]
template = 'run_defaults'

[datastores.stuff.defaults.password-config]
template = 'run_stuff'

[datastores.stuff.destinations.foo]
path = 'test'

[datastores.stuff.destinations.foo.defaults.password-config]
template = ''
"#;
        let config = Config::parse(input).unwrap();
        let effective = resolve_destination(&config, destination(&config, "stuff", "foo"));
        assert_eq!(template(&effective), Some(""));
    }

    #[test]
    fn test_args_and_template_inherit_independently() {
        let input = r#"
[defaults.password-config]
template = 'age -d -i {{ filenameArg 0 }}'
args = ['secrets/default']

[datastores.stuff.destinations.foo]
path = 'test'

[datastores.stuff.destinations.foo.defaults.password-config]
args = ['secrets/foo']
"#;
        let config = Config::parse(input).unwrap();
        let effective = resolve_destination(&config, destination(&config, "stuff", "foo"));
        assert_eq!(
            effective.password_config,
            PasswordConfig {
                template: Some("age -d -i {{ filenameArg 0 }}".to_string()),
                args: Some(vec!["secrets/foo".to_string()]),
            }
        );
    }

    #[test]
    fn test_absent_list_inherits_empty_list_does_not() {
        let input = r#"
[defaults.restic.backup]
tag = ['global']
exclude = ['*.tmp']

[datastores.stuff.destinations.foo]
path = 'test'

[datastores.stuff.destinations.foo.defaults.restic.backup]
tag = []
"#;
        let config = Config::parse(input).unwrap();
        let effective = resolve_destination(&config, destination(&config, "stuff", "foo"));
        assert_eq!(effective.restic.backup.tag, Some(vec![]));
        assert_eq!(effective.restic.backup.exclude, Some(vec!["*.tmp".to_string()]));
    }

    #[test]
    fn test_bundles_merge_independently() {
        let input = r#"
[defaults.restic.global]
no-lock = true

[defaults.restic.snapshots]
compact = true

[datastores.stuff.defaults.restic.backup]
host = 'stuff_host'

[datastores.stuff.destinations.foo]
path = 'test'

[datastores.stuff.destinations.foo.defaults.restic.global]
no-lock = false
"#;
        let config = Config::parse(input).unwrap();
        let effective = resolve_destination(&config, destination(&config, "stuff", "foo"));
        assert_eq!(effective.restic.global.no_lock, Some(false));
        assert_eq!(effective.restic.snapshots.compact, Some(true));
        assert_eq!(effective.restic.backup.host.as_deref(), Some("stuff_host"));
        assert!(effective.restic.check.is_empty());
    }

    #[test]
    fn test_resolution_does_not_mutate_tree() {
        let config = Config::parse(LAYERED).unwrap();
        let before = config.clone();

        let bar = destination(&config, "stuff", "bar");
        let first = resolve_destination(&config, bar);
        let second = resolve_destination(&config, bar);

        assert_eq!(config, before);
        assert_eq!(first, second);
        assert!(bar.defaults.is_empty());
    }

    #[test]
    fn test_orphan_destination_keeps_own_values() {
        let config = Config::parse(LAYERED).unwrap();
        let orphan = Destination {
            name: "loose".to_string(),
            path: "/repo".to_string(),
            ..Default::default()
        };
        assert!(resolve_destination(&config, &orphan).is_empty());
    }

    #[test]
    fn test_resolve_datastore() {
        let config = Config::parse(LAYERED).unwrap();
        let effective = resolve_datastore(&config, &config.datastores["stuff"]);
        assert_eq!(template(&effective), Some("run_stuff"));
        assert_eq!(effective.restic.global.verbose, Some(1));
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::Datastore("stuff").to_string(), r#"store="stuff""#);
        assert_eq!(
            Scope::Destination {
                store: Some("stuff"),
                name: "foo"
            }
            .to_string(),
            r#"store="stuff", destination="foo""#
        );
    }
}
