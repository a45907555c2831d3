//! Built-in variable lists for the French tax-benefit model.

/// Aggregates computed when the config does not list variables.
pub const DEFAULT_VARIABLES: &[&str] = &[
    "cotsoc_noncontrib",
    "csg",
    "crds",
    "irpp",
    "ppe",
    "af",
    "af_base",
    "af_majo",
    "af_forf",
    "cf",
    "paje_base",
    "paje_nais",
    "paje_clca",
    "ars",
    "aeeh",
    "asf",
    "aspa",
    "aah",
    "caah",
    "rsa",
    "rsa_act",
    "aefa",
    "api",
    "logt",
    "alf",
    "als",
    "apl",
];
