//! Restic flag bundles.
//!
//! One record per supported restic subcommand plus `global` for flags shared
//! by every subcommand. Field keys are the restic long-flag names, so a
//! record maps straight onto `--<key>=<value>` flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::merge::{merge_field, Merge};
use crate::flags::{FieldValue, FlagFields, ToFieldValue};

/// Declare a flag record from a table of `field: type => "flag-key"` rows.
///
/// Every field is optional. The generated `Merge` and `FlagFields` impls walk
/// the same table, and a field type without a `ToFieldValue` impl fails to
/// compile.
macro_rules! restic_record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$field_meta:meta])* $field:ident: $ty:ty => $key:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                #[serde(rename = $key, default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl $name {
            /// True when no field is set.
            pub fn is_empty(&self) -> bool {
                $( self.$field.is_none() && )* true
            }
        }

        impl Merge for $name {
            fn merge_from(&mut self, fallback: &Self) {
                $( merge_field(&mut self.$field, &fallback.$field); )*
            }
        }

        impl FlagFields for $name {
            fn flag_fields(&self) -> Vec<(&'static str, FieldValue)> {
                let mut out = Vec::new();
                $(
                    if let Some(value) = &self.$field {
                        out.push(($key, value.to_field_value()));
                    }
                )*
                out
            }
        }
    };
}

/// Per-subcommand flag values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResticDefaults {
    /// Flags available to every restic subcommand ("global flags" in restic's
    /// usage output)
    #[serde(default, skip_serializing_if = "ResticGlobal::is_empty")]
    pub global: ResticGlobal,

    #[serde(default, skip_serializing_if = "ResticBackup::is_empty")]
    pub backup: ResticBackup,

    #[serde(default, skip_serializing_if = "ResticCheck::is_empty")]
    pub check: ResticCheck,

    #[serde(default, skip_serializing_if = "ResticLs::is_empty")]
    pub ls: ResticLs,

    #[serde(default, skip_serializing_if = "ResticSnapshots::is_empty")]
    pub snapshots: ResticSnapshots,

    #[serde(default, skip_serializing_if = "ResticStats::is_empty")]
    pub stats: ResticStats,
}

impl ResticDefaults {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
            && self.backup.is_empty()
            && self.check.is_empty()
            && self.ls.is_empty()
            && self.snapshots.is_empty()
            && self.stats.is_empty()
    }
}

impl Merge for ResticDefaults {
    fn merge_from(&mut self, fallback: &Self) {
        self.global.merge_from(&fallback.global);
        self.backup.merge_from(&fallback.backup);
        self.check.merge_from(&fallback.check);
        self.ls.merge_from(&fallback.ls);
        self.snapshots.merge_from(&fallback.snapshots);
        self.stats.merge_from(&fallback.stats);
    }
}

restic_record! {
    /// Global flags
    pub struct ResticGlobal {
        cacert: String => "cacert",
        cache_dir: String => "cache-dir",
        cleanup_cache: bool => "cleanup-cache",
        compression: String => "compression",
        insecure_tls: bool => "insecure-tls",
        json: bool => "json",
        key_hint: String => "key-hint",
        limit_download: i64 => "limit-download",
        limit_upload: i64 => "limit-upload",
        no_cache: bool => "no-cache",
        no_lock: bool => "no-lock",
        /// Extended options, e.g. `[{ 's3.connections' = '3' }]`
        option: Vec<BTreeMap<String, String>> => "option",
        pack_size: u64 => "pack-size",
        password_command: String => "password-command",
        password_file: String => "password-file",
        quiet: bool => "quiet",
        repo: String => "repo",
        repository_file: String => "repository-file",
        tls_client_cert: String => "tls-client-cert",
        verbose: i64 => "verbose",
    }
}

restic_record! {
    /// `restic backup` flags
    pub struct ResticBackup {
        dry_run: bool => "dry-run",
        exclude: Vec<String> => "exclude",
        exclude_caches: bool => "exclude-caches",
        exclude_file: Vec<String> => "exclude-file",
        exclude_if_present: Vec<String> => "exclude-if-present",
        exclude_larger_than: String => "exclude-larger-than",
        files_from: Vec<String> => "files-from",
        files_from_raw: Vec<String> => "files-from-raw",
        files_from_verbatim: Vec<String> => "files-from-verbatim",
        force: bool => "force",
        host: String => "host",
        iexclude: Vec<String> => "iexclude",
        iexclude_file: Vec<String> => "iexclude-file",
        ignore_ctime: bool => "ignore-ctime",
        ignore_inode: bool => "ignore-inode",
        one_file_system: bool => "one-file-system",
        parent: String => "parent",
        stdin: bool => "stdin",
        stdin_filename: String => "stdin-filename",
        tag: Vec<String> => "tag",
        /// A string since restic also accepts "now"
        time: String => "time",
        with_atime: bool => "with-atime",
    }
}

restic_record! {
    /// `restic check` flags
    pub struct ResticCheck {
        read_data: bool => "read-data",
        read_data_subset: String => "read-data-subset",
        with_cache: bool => "with-cache",
    }
}

restic_record! {
    /// `restic ls` flags
    pub struct ResticLs {
        host: Vec<String> => "host",
        long: bool => "long",
        path: Vec<String> => "path",
        recursive: bool => "recursive",
        tag: Vec<String> => "tag",
    }
}

restic_record! {
    /// `restic snapshots` flags
    pub struct ResticSnapshots {
        compact: bool => "compact",
        group_by: Vec<String> => "group-by",
        host: Vec<String> => "host",
        latest: i64 => "latest",
        path: Vec<String> => "path",
        tag: Vec<String> => "tag",
    }
}

restic_record! {
    /// `restic stats` flags
    pub struct ResticStats {
        host: Vec<String> => "host",
        mode: String => "mode",
        path: Vec<String> => "path",
        tag: Vec<String> => "tag",
    }
}
