//! Example demonstrating the #[derive(Describe)] macro
//!
//! Run with:
//!   cargo run --example derive --features derive

use dependency_resolver::prelude::*;

#[derive(Clone, Describe)]
struct Database {
    #[param(default = String::from("postgres://localhost:5432/myapp"))]
    url: String,
}

#[derive(Describe)]
struct Cache {
    #[param(default = 1024usize)]
    size: usize,
}

#[derive(Describe)]
struct Logger {
    #[param(default = String::from("DEBUG"))]
    level: String,
}

// Constructor parameters in field order, the logger injected afterwards
#[derive(Describe)]
#[describe(name = "UserService")]
struct UserService {
    db: Arc<Database>,
    cache: Arc<Cache>,
    #[inject(nullable)]
    logger: Option<Arc<Logger>>,
    // Not a parameter, uses Default
    #[param(skip)]
    request_count: u64,
}

impl UserService {
    fn describe(&self) -> String {
        let logger_status = match &self.logger {
            Some(logger) => format!("logging at {}", logger.level),
            None => "without logging".to_string(),
        };
        format!(
            "UserService connected to {} with cache size {} ({}, requests: {})",
            self.db.url, self.cache.size, logger_status, self.request_count
        )
    }
}

fn main() {
    println!("=== Dependency Resolver Derive Macro Demo ===\n");

    let reflector = Reflector::new();
    reflector.describe::<Database>().expect("Database");
    reflector.describe::<Cache>().expect("Cache");
    reflector.describe::<Logger>().expect("Logger");
    reflector.describe::<UserService>().expect("UserService");
    let container = Container::new(Arc::new(reflector));

    println!("Resolving UserService...");
    let service = container.get_as::<UserService>("UserService").expect("UserService");
    println!("  {}", service.describe());
    println!();

    // The logger is nullable, so it is only injected when passed explicitly
    println!("Building a UserService with its own database...");
    let custom = container
        .make_with(
            "UserService",
            &arguments! {
                "$db" => arguments! { "url" => "postgres://replica:5432/myapp" },
                "$logger" => container.get("Logger").expect("Logger"),
            },
        )
        .expect("UserService");
    let custom = custom.downcast::<UserService>().expect("UserService");
    println!("  {}", custom.describe());
    println!();

    println!("=== Demo Complete ===");
    println!("\nThe #[derive(Describe)] macro generated a type description that:");
    println!("  - Declares every Arc<T> field as a parameter typed T");
    println!("  - Injects #[inject] fields after construction");
    println!("  - Uses Default::default() for #[param(skip)] fields");
}
