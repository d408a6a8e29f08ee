//! evroute CLI: resolve events against a route table from the shell.
//!
//! Subcommands:
//! - `eval <config> <event|->` - run the matching handlers, print their results
//! - `match <config> <event|->` - print the names of the matching routes
//! - `trace <config> <event|->` - explain every route's decision
//! - `check <config>` - validate the route table
//!
//! Handlers are not code here: every handler named in the table echoes its
//! own name, so `eval` shows which handlers a real deployment would run.

use std::io::Read;
use std::path::Path;
use std::process;

use evroute::{Event, HandlerRegistry, Resolver, ResolverConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "eval" => cmd_eval(&args[2..]),
        "match" => cmd_match(&args[2..]),
        "trace" => cmd_trace(&args[2..]),
        "check" => cmd_check(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("error: unknown command \"{other}\"");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_eval(args: &[String]) -> Result<(), String> {
    let (config_path, event_arg) = config_and_event("eval", args)?;
    let resolver = load_resolver(config_path)?;
    let event = load_event(event_arg)?;

    let results = eval(&resolver, &event)?;
    let out = serde_json::to_string_pretty(&results).map_err(|e| e.to_string())?;
    println!("{out}");
    Ok(())
}

fn cmd_match(args: &[String]) -> Result<(), String> {
    let (config_path, event_arg) = config_and_event("match", args)?;
    let resolver = load_resolver(config_path)?;
    let event = load_event(event_arg)?;

    let names = resolver
        .matching_routes(&event)
        .map_err(|e| format!("evaluation failed: {e}"))?;
    if names.is_empty() {
        println!("(no match)");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn cmd_trace(args: &[String]) -> Result<(), String> {
    let (config_path, event_arg) = config_and_event("trace", args)?;
    let resolver = load_resolver(config_path)?;
    let event = load_event(event_arg)?;

    let traces = resolver
        .trace(&event)
        .map_err(|e| format!("evaluation failed: {e}"))?;
    for step in traces {
        let verdict = if step.matched { "matched" } else { "skipped" };
        print!("{} ({verdict})\n{}", step.name, step.condition);
    }
    Ok(())
}

fn cmd_check(args: &[String]) -> Result<(), String> {
    let [config_path] = args else {
        return Err("check requires exactly one config file path".into());
    };

    let resolver = load_resolver(config_path)?;
    println!("Config valid: {} route(s)", resolver.len());
    Ok(())
}

fn eval(resolver: &Resolver<String>, event: &Event) -> Result<Vec<String>, String> {
    resolver.resolve(event).map_err(|e| format!("{} error: {e}", e.kind()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registry assembly (composition root)
// ═══════════════════════════════════════════════════════════════════════════════

/// One echo handler per handler name the table mentions.
fn echo_registry(config: &ResolverConfig) -> HandlerRegistry<String> {
    config
        .routes
        .iter()
        .fold(HandlerRegistry::builder(), |builder, route| {
            let name = route.handler.clone();
            builder.handler(route.handler.as_str(), move |_: &Event| Ok(name.clone()))
        })
        .build()
}

fn load_resolver(path: &str) -> Result<Resolver<String>, String> {
    let config = ResolverConfig::load(path).map_err(|e| e.to_string())?;
    tracing::debug!(path, routes = config.routes.len(), "loaded config");
    echo_registry(&config)
        .load_resolver(&config)
        .map_err(|e| format!("config invalid: {e}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Argument parsing and input
// ═══════════════════════════════════════════════════════════════════════════════

fn config_and_event<'a>(command: &str, args: &'a [String]) -> Result<(&'a str, &'a str), String> {
    match args {
        [config, event] => Ok((config.as_str(), event.as_str())),
        _ => Err(format!(
            "{command} requires a config file path and an event file path (or - for stdin)"
        )),
    }
}

/// Read a JSON event from a file, or from stdin when `arg` is `-`.
fn load_event(arg: &str) -> Result<Event, String> {
    let content = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        buf
    } else {
        std::fs::read_to_string(Path::new(arg))
            .map_err(|e| format!("failed to read \"{arg}\": {e}"))?
    };
    serde_json::from_str(&content).map_err(|e| format!("event is not valid JSON: {e}"))
}

fn print_usage() {
    eprintln!(
        "Usage: evroute <command> [options]

Commands:
  eval <config> <event|->    Run matching handlers, print results as JSON
  match <config> <event|->   Print matching route names
  trace <config> <event|->   Explain each route's decision
  check <config>             Validate config
  help                       Show this help

Configs ending in .json are read as JSON, anything else as YAML.
Set RUST_LOG (e.g. RUST_LOG=evroute=debug) for diagnostics on stderr."
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r"
allow_multiple_routes: true
routes:
  - handler: handle_test
    when: { path: a.b.c, one_of: [TEST] }
  - handler: handle_d
    when: { path: a.d, equals: 1 }
  - handler: handle_d
    name: again
    when: { path: a.e, is_truthy: true }
";

    fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn path_of(file: &NamedTempFile) -> &str {
        file.path().to_str().unwrap()
    }

    #[test]
    fn test_echo_registry_covers_every_handler_once() {
        let config = ResolverConfig::from_yaml(CONFIG).unwrap();
        let registry = echo_registry(&config);
        assert_eq!(registry.names(), ["handle_d", "handle_test"]);
    }

    #[test]
    fn test_eval_yaml_config() {
        let file = write_temp(".yaml", CONFIG);
        let resolver = load_resolver(path_of(&file)).unwrap();
        assert_eq!(resolver.route_names(), ["handle_test", "handle_d", "again"]);

        let event = json!({"a": {"b": {"c": "TEST"}, "d": 1}});
        assert_eq!(eval(&resolver, &event).unwrap(), ["handle_test", "handle_d"]);
        assert!(eval(&resolver, &json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_eval_reports_policy_violation() {
        let file = write_temp(
            ".json",
            r#"{"allow_no_route": false, "routes": [{"handler": "h", "when": {"path": "a", "equals": 1}}]}"#,
        );
        let resolver = load_resolver(path_of(&file)).unwrap();
        let err = eval(&resolver, &json!({"a": 2})).unwrap_err();
        assert!(err.starts_with("no_route error"), "{err}");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let file = write_temp(".yaml", "routes:\n  - { handler: h, when: { path: a } }\n");
        let err = load_resolver(path_of(&file)).unwrap_err();
        assert!(err.starts_with("config invalid"), "{err}");
    }

    #[test]
    fn test_missing_config_file() {
        assert!(load_resolver("/nonexistent/evroute.yaml").is_err());
    }

    #[test]
    fn test_load_event_from_file() {
        let file = write_temp(".json", r#"{"a": {"d": 1}}"#);
        assert_eq!(load_event(path_of(&file)).unwrap(), json!({"a": {"d": 1}}));

        let bad = write_temp(".json", "{not json");
        assert!(load_event(path_of(&bad)).unwrap_err().contains("not valid JSON"));
    }

    #[test]
    fn test_config_and_event_arity() {
        let args: Vec<String> = vec!["c.yaml".into(), "-".into()];
        assert_eq!(config_and_event("eval", &args).unwrap(), ("c.yaml", "-"));
        assert!(config_and_event("eval", &args[..1]).is_err());
    }
}
