#[macro_use]
extern crate rocket;

pub mod auth;
pub mod db;
pub mod request_logger;
pub mod routes;

use std::sync::Once;

use crate::auth::AuthState;
use crate::db::HushzoneDb;
use crate::request_logger::RequestLogger;
use chrono::Utc;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};

const PURGE_INTERVAL_SECS: u64 = 3600;

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Delete]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    // DATABASE_URL takes precedence over Rocket.toml so deployments keep a
    // single connection-string source. The connect timeout bounds every
    // pool acquisition; a slow store surfaces as 503, not a hung request.
    let figment = rocket::Config::figment();
    let figment = match std::env::var("DATABASE_URL") {
        Ok(url) => figment
            .merge(("databases.hushzone_db.url", url))
            .merge(("databases.hushzone_db.connect_timeout", 5)),
        Err(_) => figment,
    };

    rocket::custom(figment)
        .attach(RequestLogger)
        .attach(HushzoneDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match HushzoneDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match db::run_migrations(&pool).await {
                            Ok(()) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // Wire the auth components from environment configuration and
        // manage them (plus a plain pool clone) as Rocket state.
        .attach(AdHoc::try_on_ignite("Manage Auth State", |rocket| async move {
            match HushzoneDb::fetch(&rocket) {
                Some(db) => {
                    let pool = (**db).clone();
                    let config = match auth::AuthConfig::from_env() {
                        Ok(config) => config,
                        Err(e) => {
                            log::error!("auth configuration invalid: {}", e);
                            return Err(rocket);
                        }
                    };
                    match AuthState::from_config(config, pool.clone()) {
                        Ok(state) => Ok(rocket.manage(pool).manage(state)),
                        Err(e) => {
                            log::error!("failed to build auth state: {}", e);
                            Err(rocket)
                        }
                    }
                }
                None => {
                    log::error!("database pool not available for auth state");
                    Err(rocket)
                }
            }
        }))
        // Spawn background cleanup of expired refresh-token records
        .attach(AdHoc::on_liftoff("Spawn Refresh Token Purge", |rocket| {
            Box::pin(async move {
                if let Some(state) = rocket.state::<AuthState>() {
                    let store = state.sessions.refresh_tokens().clone();
                    tokio::spawn(async move {
                        let mut interval = tokio::time::interval(
                            std::time::Duration::from_secs(PURGE_INTERVAL_SECS),
                        );
                        loop {
                            interval.tick().await;
                            match store.purge_expired(Utc::now()).await {
                                Ok(0) => {}
                                Ok(purged) => {
                                    log::info!("purged {} expired refresh tokens", purged);
                                }
                                Err(err) => log::warn!("refresh token purge failed: {}", err),
                            }
                        }
                    });
                } else {
                    log::error!("failed to spawn refresh token purge: auth state not found");
                }
            })
        }))
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Auth routes
                auth::routes::sign_up,
                auth::routes::sign_in,
                auth::routes::refresh,
                auth::routes::logout,
                auth::routes::google_sign_in,
                auth::routes::me,
            ],
        )
        // Guard failures bypass handlers; these catchers keep the error
        // body contract for them.
        .register("/", auth::routes::catchers())
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Hushzone API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use sqlx::PgPool;

    use crate::auth::{AuthConfig, AuthState};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Deterministic configuration for tests: distinct secrets per token
    /// class, default TTLs and a tokeninfo URL pointing nowhere (tests that
    /// exercise external sign-in override it with a mock server).
    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "access-secret-for-tests".into(),
            refresh_token_secret: "refresh-secret-for-tests".into(),
            access_token_ttl_mins: 15,
            refresh_token_ttl_days: 30,
            google_client_id: "hushzone-test-client".into(),
            google_tokeninfo_url: "http://127.0.0.1:1/tokeninfo".into(),
        }
    }

    /// Builder for constructing Rocket instances tailored for integration
    /// tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        auth_state: Option<AuthState>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging
        /// disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pg_pool: None,
                auth_state: None,
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Manage a `PgPool` for tests exercising database-backed routes.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Manage a fully wired [`AuthState`].
        pub fn manage_auth_state(mut self, state: AuthState) -> Self {
            self.auth_state = Some(state);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket =
                rocket::custom(self.figment).register("/", crate::auth::routes::catchers());

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            if let Some(state) = self.auth_state {
                rocket = rocket.manage(state);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }

    pub mod database {
        use sqlx::PgPool;
        use sqlx::postgres::PgPoolOptions;
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral migrated database for integration tests, backed by a
        /// disposable Postgres container that lives as long as this value.
        pub struct TestDatabase {
            pool: PgPool,
            container: ContainerAsync<GenericImage>,
        }

        impl TestDatabase {
            pub async fn new() -> Result<Self, TestDatabaseError> {
                // Postgres reports readiness twice (initdb restart), hence
                // the double wait.
                let image = GenericImage::new("postgres", "16-alpine")
                    .with_wait_for(WaitFor::message_on_stdout(
                        "database system is ready to accept connections",
                    ))
                    .with_wait_for(WaitFor::message_on_stderr(
                        "database system is ready to accept connections",
                    ));

                let request = image
                    .with_env_var("POSTGRES_DB", "hushzone_test")
                    .with_env_var("POSTGRES_USER", "postgres")
                    .with_env_var("POSTGRES_PASSWORD", "postgres");

                let container = request.start().await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{}:{}/hushzone_test", host, port);

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&url)
                    .await?;

                crate::db::run_migrations(&pool).await?;

                Ok(Self { pool, container })
            }

            pub fn pool(&self) -> &PgPool {
                &self.pool
            }

            /// Clone of the pooled connection handle for Rocket state.
            pub fn pool_clone(&self) -> PgPool {
                self.pool.clone()
            }

            /// Close pool connections and tear the container down.
            pub async fn close(self) {
                self.pool.close().await;
                drop(self.container);
            }
        }
    }
}
