#[derive(Debug, thiserror::Error)]
pub enum GcloudError {
    #[error("gcloud CLI not found; install it from https://cloud.google.com/sdk/docs/install")]
    NotFound { source: std::io::Error },

    #[error("gcloud {} failed\n{stderr}", args.join(" "))]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("gcloud output was not valid UTF-8")]
    InvalidUtf8 { source: std::string::FromUtf8Error },
}
