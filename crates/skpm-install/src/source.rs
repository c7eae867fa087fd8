//! Registry-backed package source for the resolver.

use skpm_registry::{PackageManifest, PackageSource, RegistryClient};

/// Answers resolver queries from a registry client.
///
/// Only catalog documents are read while resolving. Archives are fetched
/// and verified against the locked digests once the graph is settled.
pub struct RegistryPackageSource<'a> {
    client: &'a RegistryClient,
}

impl<'a> RegistryPackageSource<'a> {
    pub fn new(client: &'a RegistryClient) -> Self {
        RegistryPackageSource { client }
    }
}

impl PackageSource for RegistryPackageSource<'_> {
    fn list_versions(&self, name: &str) -> skpm_registry::Result<Vec<String>> {
        self.client.list_package_versions(name)
    }

    fn get_manifest(&self, name: &str, version: &str) -> skpm_registry::Result<PackageManifest> {
        self.client.get_manifest(name, version)
    }

    fn get_integrity(&self, name: &str, version: &str) -> skpm_registry::Result<String> {
        Ok(self
            .client
            .get_integrity_and_location(name, version)?
            .integrity)
    }
}
