//! Prefix matching and tag rewriting of image references.

use crate::platform::ServiceDescriptor;

/// Returns the first prefix in `prefixes` that `image` starts with.
pub fn matching_prefix<'a, S: AsRef<str>>(image: &str, prefixes: &'a [S]) -> Option<&'a str> {
    prefixes
        .iter()
        .map(AsRef::as_ref)
        .find(|prefix| image.starts_with(prefix))
}

pub fn matches<S: AsRef<str>>(image: &str, prefixes: &[S]) -> bool {
    matching_prefix(image, prefixes).is_some()
}

/// Replaces the tag of `image` with `version`.
///
/// Everything after the last `:` is replaced, or `:<version>` is appended when
/// the image has no tag. If the result no longer starts with `prefix` the
/// image becomes `<prefix>:<version>`.
pub fn rewrite_tag(image: &str, prefix: &str, version: &str) -> String {
    let repository = match image.rsplit_once(':') {
        Some((repository, _tag)) => repository,
        None => image,
    };
    let rewritten = format!("{repository}:{version}");

    if rewritten.starts_with(prefix) {
        rewritten
    } else {
        format!("{prefix}:{version}")
    }
}

/// A matched service together with the image it will be moved to.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedUpdate {
    pub service: ServiceDescriptor,
    pub matched_prefix: String,
    pub new_image: String,
}

/// Selects the services to update, preserving the order of `services`.
pub fn plan_updates<S: AsRef<str>>(
    services: Vec<ServiceDescriptor>,
    prefixes: &[S],
    version: &str,
) -> Vec<PlannedUpdate> {
    services
        .into_iter()
        .filter_map(|service| {
            let prefix = matching_prefix(&service.image, prefixes)?;
            let new_image = rewrite_tag(&service.image, prefix, version);
            Some(PlannedUpdate {
                matched_prefix: prefix.to_string(),
                new_image,
                service,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, image: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            id: format!("{name}-id"),
            name: name.to_string(),
            image: image.to_string(),
            replicas: 1,
        }
    }

    #[test]
    fn test_matches() {
        assert!(matches("myapp:v1", &["myapp"]));
        assert!(!matches("otherapp:v1", &["myapp"]));
        assert!(matches("myapp:v1", &["myapp", "otherapp"]));
        assert!(!matches("myapp:v1", &[] as &[&str]));
        // Literal and case-sensitive
        assert!(!matches("MyApp:v1", &["myapp"]));
        assert!(!matches("registry.io/myapp:v1", &["myapp"]));
    }

    #[test]
    fn test_first_matching_prefix_wins() {
        let prefixes = ["ghcr.io/acme", "ghcr.io/acme/api"];
        assert_eq!(
            matching_prefix("ghcr.io/acme/api:v1", &prefixes),
            Some("ghcr.io/acme")
        );
        let prefixes = ["ghcr.io/acme/api", "ghcr.io/acme"];
        assert_eq!(
            matching_prefix("ghcr.io/acme/api:v1", &prefixes),
            Some("ghcr.io/acme/api")
        );
    }

    #[test]
    fn test_rewrite_tag() {
        assert_eq!(rewrite_tag("myapp:v1.0.0", "myapp", "v2"), "myapp:v2");
        assert_eq!(rewrite_tag("myapp", "myapp", "v2"), "myapp:v2");
        assert_eq!(
            rewrite_tag("ghcr.io/acme/api:sha-1234", "ghcr.io/acme", "v2"),
            "ghcr.io/acme/api:v2"
        );
        // Registry port is kept, only the tag after the last colon changes
        assert_eq!(
            rewrite_tag("localhost:5000/api:v1", "localhost:5000/api", "v2"),
            "localhost:5000/api:v2"
        );
    }

    #[test]
    fn test_rewrite_falls_back_to_prefix() {
        // The prefix reaches into the old tag, so the rewritten image loses it
        assert_eq!(rewrite_tag("myapp:v1.0", "myapp:v1", "v2"), "myapp:v1:v2");
        // No tag but a port: the port is treated as the tag
        assert_eq!(
            rewrite_tag("localhost:5000/api", "localhost:5000", "v2"),
            "localhost:5000:v2"
        );
    }

    #[test]
    fn test_plan_updates_preserves_order() {
        let services = vec![
            service("worker", "ghcr.io/acme/worker:v1"),
            service("postgres", "postgres:16"),
            service("api", "ghcr.io/acme/api:v1"),
            service("web", "ghcr.io/other/web:v1"),
        ];

        let plan = plan_updates(services, &["ghcr.io/acme/api", "ghcr.io/acme/worker"], "v2");

        let names: Vec<_> = plan.iter().map(|p| p.service.name.as_str()).collect();
        assert_eq!(names, vec!["worker", "api"]);
        assert_eq!(plan[0].matched_prefix, "ghcr.io/acme/worker");
        assert_eq!(plan[0].new_image, "ghcr.io/acme/worker:v2");
        assert_eq!(plan[1].new_image, "ghcr.io/acme/api:v2");
    }

    #[test]
    fn test_plan_updates_no_match() {
        let services = vec![service("postgres", "postgres:16")];
        assert!(plan_updates(services, &["ghcr.io/acme"], "v2").is_empty());
    }
}
