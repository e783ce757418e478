use std::path::PathBuf;

/// The configuration parameters for the application.
///
/// These can either be passed on the command line, or pulled from environment variables.
/// The latter is preferred as environment variables are one of the recommended ways to
/// get configuration from Kubernetes Secrets in deployment.
///
/// This is a pretty simple configuration struct as far as backend APIs go. You could imagine
/// a bunch of other parameters going here, like API keys for external services
/// or flags enabling or disabling certain features or test modes of the API.
///
/// For development convenience, these can also be read from a `.env` file in the working
/// directory where the application is started.
///
/// See `.env.sample` in the repository root for details.
#[derive(clap::Parser, Default)]
pub struct Config {
    /// The connection URL for the Postgres database this application should use.
    #[clap(long, env)]
    pub database_url: String,

    /// The HMAC signing and verification key used for login tokens (JWTs).
    ///
    /// There is no required structure or format to this key as it's just fed into a hash function.
    /// In practice, it should be a long, random string that would be infeasible to brute-force.
    #[clap(long, env)]
    pub hmac_key: String,

    #[clap(long, env, default_value_t = 8080)]
    pub port: u16,

    /// Directory uploaded images are written to and served from under `/uploads/`.
    #[clap(long, env, default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Upper bound on a whole request body, which is what limits multipart uploads.
    #[clap(long, env, default_value_t = 25 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Sender address for the welcome email.
    #[clap(long, env, default_value = "no-reply@localhost")]
    pub mail_from: String,

    /// HTTP relay that accepts `{ from, to, subject, text }` as JSON and delivers it.
    ///
    /// When unset, outgoing mail is only logged.
    #[clap(long, env)]
    pub mail_webhook_url: Option<String>,
}
