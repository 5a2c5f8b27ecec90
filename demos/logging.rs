//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use dependency_resolver::prelude::*;

#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    db: Arc<Database>,
}

fn reflector() -> Arc<Reflector> {
    let reflector = Reflector::new();

    // logs: "Registering type description"
    reflector
        .register_type(
            TypeDescriptor::builder::<Database>("Database")
                .constructor(
                    vec![Parameter::new("url").default_value(Value::new(String::from("postgres://localhost/mydb")))],
                    |args| Ok(Database { url: args.cloned(0)? }),
                )
                .build(),
        )
        .expect("Database");
    reflector
        .register_type(
            TypeDescriptor::builder::<UserService>("UserService")
                .constructor(vec![Parameter::new("db").of_type("Database")], |args| {
                    Ok(UserService { db: args.shared(0)? })
                })
                .build(),
        )
        .expect("UserService");
    Arc::new(reflector)
}

fn main() {
    // JSON with logging-json, pretty with logging-pretty, nothing otherwise
    #[cfg(feature = "logging")]
    {
        dependency_resolver::logging::builder()
            .trace()
            .resolver_only()
            .with_thread_names()
            .init();
    }

    println!("=== Dependency Resolver Logging Demo ===\n");

    // logs: "Creating container"
    let container = Container::new(reflector());

    // logs: "Defining entry", "Memoized definition", "Memoized constructor signature"
    container.define("users", "UserService").unwrap();

    // logs: "Making entry" for users, then for Database
    let _users = container.get("users").unwrap();

    // logs: "Shared instance hit"
    let _again = container.get("users").unwrap();

    // logs: "No entry found"
    let missing = container.get("Cache");
    assert!(missing.is_err());

    // logs: "Batch definition completed"
    container
        .define_many(BatchPolicy::Skip)
        .define("db", "Database")
        .define("broken", "Cache")
        .done()
        .unwrap();

    // logs: "Clearing shared instances"
    container.unset_all();

    println!("\n=== Demo Complete ===");
    println!("Check the log output above to see structured logging in action!");
    println!("\nTip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");
}
