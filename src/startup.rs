use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::cache::Cache;
use crate::config::{DatabaseSettings, Settings};
use crate::email_client::EmailClient;
use crate::newsletter_client::NewsletterApiClient;
use crate::routes::{
    handle_confirm_subscriber, handle_create_referral_link, handle_create_subscriber,
    handle_delete_subscriber, handle_get_issues, handle_get_rewards, handle_update_member,
    health_check,
};

pub struct ApplicationBaseUrl(pub String);

/// Frontend URL users are redirected to when a token is rejected.
pub struct ErrorRedirectUrl(pub String);

/// Maximum number of issues served (and cached) by GET /issues.
pub struct IssuesLimit(pub usize);

pub struct Application {
    pub port: u16,
    pub server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, std::io::Error> {
        let db_pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(2))
            .connect_lazy_with(config.get_db_options());
        let sender_email = config
            .get_email_client_sender()
            .expect("Sender email is not valid");
        let email_client = EmailClient::new(
            config.get_email_client_base_url(),
            sender_email,
            config.get_email_client_sender_name(),
            config.get_email_client_api(),
            None,
        );
        let newsletter_client = NewsletterApiClient::new(
            config.get_newsletter_api_base_url(),
            config.get_newsletter_api_key(),
            None,
        );
        let redis_client = redis::Client::open(config.get_redis_address())
            .expect("Failed to create the Redis client.");
        let cache = Cache::new(redis_client, config.get_redis_key_prefix());

        let listener =
            TcpListener::bind(config.get_address()).expect("Failed to bind the address.");
        let port = listener.local_addr().unwrap().port();
        let server = run(
            listener,
            db_pool,
            email_client,
            newsletter_client,
            cache,
            config.get_app_base_url(),
            config.get_error_redirect_url(),
            config.get_issues_limit(),
        )?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    email_client: EmailClient,
    newsletter_client: NewsletterApiClient,
    cache: Cache,
    base_url: String,
    error_redirect_url: String,
    issues_limit: usize,
) -> Result<Server, std::io::Error> {
    let db_pool = web::Data::new(db_pool);
    let email_client = web::Data::new(email_client);
    let newsletter_client = web::Data::new(newsletter_client);
    let cache = web::Data::new(cache);
    let base_url = web::Data::new(ApplicationBaseUrl(base_url));
    let error_redirect_url = web::Data::new(ErrorRedirectUrl(error_redirect_url));
    let issues_limit = web::Data::new(IssuesLimit(issues_limit));

    let server = HttpServer::new(move || {
        // App is where your application logic lives: routing, middlewares, request handler, etc
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/issues", web::get().to(handle_get_issues))
            .route("/rewards", web::get().to(handle_get_rewards))
            .route("/subscriber", web::post().to(handle_create_subscriber))
            .route("/subscriber", web::delete().to(handle_delete_subscriber))
            .route(
                "/subscriber/confirm",
                web::patch().to(handle_confirm_subscriber),
            )
            .route("/subscriber/member", web::patch().to(handle_update_member))
            .route(
                "/subscriber/referralLink",
                web::post().to(handle_create_referral_link),
            )
            .app_data(db_pool.clone())
            .app_data(email_client.clone())
            .app_data(newsletter_client.clone())
            .app_data(cache.clone())
            .app_data(base_url.clone())
            .app_data(error_redirect_url.clone())
            .app_data(issues_limit.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
