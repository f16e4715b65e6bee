//! Static table of components and the sub-packages they ship.

/// Components downloaded from every manifest, with their sub-packages.
const COMPONENTS: &[(&str, &[&str])] = &[
    ("apm-server", &["apm-server"]),
    (
        "beats",
        &[
            "auditbeat",
            "filebeat",
            "heartbeat",
            "metricbeat",
            "osquerybeat",
            "packetbeat",
        ],
    ),
    ("cloud-defend", &["cloud-defend"]),
    ("cloudbeat", &["cloudbeat"]),
    ("elastic-agent-shipper", &["elastic-agent-shipper"]),
    ("endpoint-dev", &["endpoint-security"]),
    ("fleet-server", &["fleet-server"]),
    (
        "prodfiler",
        &["pf-elastic-collector", "pf-elastic-symbolizer", "pf-host-agent"],
    ),
];

/// Ordered mapping from component name to its sub-package names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    components: Vec<(String, Vec<String>)>,
}

impl ComponentSpec {
    /// Creates a table from explicit entries.
    pub fn new<I, C, P>(components: I) -> Self
    where
        I: IntoIterator<Item = (C, Vec<P>)>,
        C: Into<String>,
        P: Into<String>,
    {
        Self {
            components: components
                .into_iter()
                .map(|(c, pkgs)| (c.into(), pkgs.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Iterates over every `(component, sub-package)` pair.
    pub fn packages(&self) -> impl Iterator<Item = (&str, &str)> {
        self.components.iter().flat_map(|(component, packages)| {
            packages.iter().map(move |p| (component.as_str(), p.as_str()))
        })
    }

    /// Sub-packages of `component`, if it is in the table.
    pub fn get(&self, component: &str) -> Option<&[String]> {
        self.components
            .iter()
            .find(|(c, _)| c == component)
            .map(|(_, p)| p.as_slice())
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the table lists no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Default for ComponentSpec {
    fn default() -> Self {
        Self::new(COMPONENTS.iter().map(|(c, p)| (*c, p.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let spec = ComponentSpec::default();
        assert_eq!(spec.len(), 8);
        assert_eq!(
            spec.get("beats").unwrap(),
            &["auditbeat", "filebeat", "heartbeat", "metricbeat", "osquerybeat", "packetbeat"]
        );
        assert_eq!(spec.get("endpoint-dev").unwrap(), &["endpoint-security"]);
        assert!(spec.get("elastic-agent").is_none());
    }

    #[test]
    fn test_packages_flattens_in_order() {
        let spec = ComponentSpec::new([("beats", vec!["auditbeat", "filebeat"]), ("apm-server", vec!["apm-server"])]);
        let pairs: Vec<_> = spec.packages().collect();
        assert_eq!(
            pairs,
            vec![
                ("beats", "auditbeat"),
                ("beats", "filebeat"),
                ("apm-server", "apm-server")
            ]
        );
    }

    #[test]
    fn test_sub_package_names_are_distinct() {
        let spec = ComponentSpec::default();
        let mut names: Vec<_> = spec.packages().map(|(_, p)| p).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
