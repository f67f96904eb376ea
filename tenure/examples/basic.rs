//! Basic example of the Tenure DI container.

use std::sync::Arc;

use tenure::prelude::*;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

impl Injectable for ConsoleLogger {
    fn construct(_: &mut Arguments) -> Result<Self> {
        Ok(ConsoleLogger)
    }
}

tenure::implements!(ConsoleLogger => dyn Logger);

struct Database {
    url: Arc<String>,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl Injectable for UserRepository {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Database>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(UserRepository { db: args.next()? })
    }
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl Injectable for UserService {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<UserRepository>(), Dependency::of::<dyn Logger>()]
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(UserService {
            repo: args.next()?,
            logger: args.next()?,
        })
    }
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("tenure_container=debug")
        .init();

    let services = ServiceCollection::new();
    let database_url = InjectionToken::<String>::new("DATABASE_URL")?;

    // Configuration value behind a token
    services.add_singleton(
        &database_url,
        Implementation::factory(|_| Ok(String::from("postgres://localhost/myapp"))),
    )?;

    // Logger: one for the whole process
    services.add_singleton(service::<dyn Logger>(), Implementation::of::<ConsoleLogger>())?;

    // Database: singleton built by a factory from other singletons
    let url = database_url.clone();
    services.add_singleton(
        service::<Database>(),
        Implementation::factory(move |activation| {
            Ok(Database {
                url: activation.get_required_service(&url)?,
                logger: activation.get_required_service(service::<dyn Logger>())?,
            })
        }),
    )?;

    // UserRepository: one per request
    services.add_scoped(service::<UserRepository>(), Implementation::itself())?;

    // UserService: new each time
    services.add_transient(service::<UserService>(), Implementation::itself())?;

    services.validate()?;
    println!("Container ready: {services:?}");

    let provider = services.build_service_provider();

    // A transient that needs a scoped dependency must be given a context
    if let Err(err) = provider.get_required_service(service::<UserService>(), None) {
        println!("Without a context: {err}");
    }

    // === Create a scope (e.g., for an HTTP request) ===
    provider.create_scope(|context| {
        let users = provider.get_required_service(service::<UserService>(), Some(context))?;
        println!("{}", users.get_user(42));

        // Same scope, same repository
        let again = provider.get_required_service(service::<UserService>(), Some(context))?;
        println!("{}", again.get_user(7));
        println!("Shared repository: {}", Arc::ptr_eq(&users.repo, &again.repo));
        Ok(())
    })?;
    // scope destroyed: its UserRepository is gone

    println!("Everything works!");
    Ok(())
}
