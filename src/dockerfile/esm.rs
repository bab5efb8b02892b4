//! The ESM allowlist: packages that must be bundled rather than marked
//! `--external:` because of CJS/ESM interop problems (§4.3 step 2).

pub const ESM_ALLOWLIST: &[&str] = &[
    "nanoid",
    "p-limit",
    "p-queue",
    "chalk",
    "node-fetch",
    "execa",
    "globby",
    "del",
    "got",
    "ora",
];

pub fn is_esm_allowlisted(package: &str) -> bool {
    ESM_ALLOWLIST.contains(&package)
}

/// Compute the external-package set for the bundler: the union of runtime
/// dependencies across every workspace `package.json`, minus the ESM
/// allowlist, minus any intra-workspace package name (Testable Property 5).
pub fn compute_external_packages<'a>(
    workspace_deps: impl Iterator<Item = &'a str>,
    workspace_package_names: &[String],
) -> Vec<String> {
    let mut set: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for dep in workspace_deps {
        if is_esm_allowlisted(dep) {
            continue;
        }
        if workspace_package_names.iter().any(|n| n == dep) {
            continue;
        }
        set.insert(dep.to_string());
    }
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlisted_package_never_external() {
        let deps = vec!["chalk", "lodash"];
        let external = compute_external_packages(deps.into_iter(), &[]);
        assert!(!external.contains(&"chalk".to_string()));
        assert!(external.contains(&"lodash".to_string()));
    }

    #[test]
    fn test_intra_workspace_package_never_external() {
        let deps = vec!["@myorg/shared", "lodash"];
        let names = vec!["@myorg/shared".to_string()];
        let external = compute_external_packages(deps.into_iter(), &names);
        assert!(!external.contains(&"@myorg/shared".to_string()));
        assert!(external.contains(&"lodash".to_string()));
    }
}
