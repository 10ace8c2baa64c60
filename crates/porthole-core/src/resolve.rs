//! Friendly names and icons for discovered services.
//!
//! Pure lookups against two static tables: well-known ports first,
//! then well-known process names. No I/O and no failure modes, so the
//! rest of the pipeline can call this unconditionally.

/// Icon used when neither table matches.
const GENERIC_ICON: &str = "fa-plug";

/// Display label for a service: a human-readable name plus an icon
/// token understood by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLabel {
    pub name: String,
    pub icon: String,
}

impl ServiceLabel {
    fn new(name: &str, icon: &str) -> Self {
        Self {
            name: name.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Resolve the display label for a listening port.
///
/// Priority order: an exact port match wins over a process match,
/// which wins over the raw process name, which wins over a generic
/// `Port {port}` label. Process names are lowercased and a trailing
/// `.exe` is stripped before the table lookup.
pub fn resolve(port: u16, process_name: &str) -> ServiceLabel {
    if let Some((name, icon)) = known_port(port) {
        return ServiceLabel::new(name, icon);
    }

    let lowered = process_name.to_lowercase();
    let key = lowered.strip_suffix(".exe").unwrap_or(&lowered);
    if let Some((name, icon)) = known_process(key) {
        return ServiceLabel::new(name, icon);
    }

    if !process_name.is_empty() {
        return ServiceLabel::new(process_name, GENERIC_ICON);
    }
    ServiceLabel::new(&format!("Port {port}"), GENERIC_ICON)
}

fn known_port(port: u16) -> Option<(&'static str, &'static str)> {
    let entry = match port {
        80 => ("HTTP Server", "fa-globe"),
        443 => ("HTTPS Server", "fa-lock"),
        1080 => ("SOCKS Proxy", "fa-shield-halved"),
        3000 => ("React Dev Server", "fa-react"),
        3306 => ("MySQL", "fa-database"),
        4200 => ("Angular Dev Server", "fa-angular"),
        5000 => ("Flask", "fa-pepper-hot"),
        5173 => ("Vite", "fa-bolt"),
        5432 => ("PostgreSQL", "fa-database"),
        5500 => ("Live Server", "fa-broadcast-tower"),
        6379 => ("Redis", "fa-server"),
        8000 => ("Dev Server", "fa-code"),
        8080 => ("HTTP Server", "fa-globe"),
        8443 => ("HTTPS Alt", "fa-lock"),
        8888 => ("Jupyter", "fa-book"),
        9090 => ("Prometheus", "fa-chart-line"),
        9200 => ("Elasticsearch", "fa-magnifying-glass"),
        27017 => ("MongoDB", "fa-leaf"),
        _ => return None,
    };
    Some(entry)
}

fn known_process(key: &str) -> Option<(&'static str, &'static str)> {
    let entry = match key {
        "node" => ("Node.js", "fa-node-js"),
        "python" | "python3" => ("Python", "fa-python"),
        "nginx" => ("Nginx", "fa-server"),
        "httpd" => ("Apache", "fa-feather"),
        "redis-server" => ("Redis", "fa-server"),
        "mongod" => ("MongoDB", "fa-leaf"),
        "postgres" => ("PostgreSQL", "fa-database"),
        "mysqld" => ("MySQL", "fa-database"),
        "java" => ("Java", "fa-java"),
        "ruby" => ("Ruby", "fa-gem"),
        "php" => ("PHP", "fa-php"),
        "deno" => ("Deno", "fa-dinosaur"),
        "bun" => ("Bun", "fa-bread-slice"),
        _ => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_port_wins_over_process() {
        let label = resolve(443, "");
        assert_eq!(label.name, "HTTPS Server");
        assert_eq!(label.icon, "fa-lock");

        // port labels win even when the process would also match
        let label = resolve(3000, "python3");
        assert_eq!(label.name, "React Dev Server");
        assert_eq!(label.icon, "fa-react");
    }

    #[test]
    fn test_process_table_matches_normalized_name() {
        let label = resolve(9999, "nginx");
        assert_eq!(label.name, "Nginx");
        assert_eq!(label.icon, "fa-server");

        let label = resolve(9999, "node");
        assert_eq!(label.name, "Node.js");
        assert_eq!(label.icon, "fa-node-js");

        // case folded and .exe stripped before lookup
        let label = resolve(9999, "Node.EXE");
        assert_eq!(label.name, "Node.js");

        let label = resolve(12345, "python3");
        assert_eq!(label.name, "Python");
        assert_eq!(label.icon, "fa-python");
    }

    #[test]
    fn test_unknown_process_passes_through_raw() {
        let label = resolve(9999, "mystery-daemon");
        assert_eq!(label.name, "mystery-daemon");
        assert_eq!(label.icon, "fa-plug");
    }

    #[test]
    fn test_empty_process_falls_back_to_port_label() {
        let label = resolve(49152, "");
        assert_eq!(label.name, "Port 49152");
        assert_eq!(label.icon, "fa-plug");
    }
}
