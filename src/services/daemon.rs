use anyhow::{Context, Result};
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_BASE_PATH: &str = "/chunk-upload/";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const HOOK_EVENTS: &[&str] = &["pre-create", "pre-finish"];
/// Client headers the daemon passes through to the hook so the session can
/// be authenticated.
pub const FORWARDED_HEADERS: &[&str] = &["Cookie", "X-Csrftoken", "User-Agent", "Authorization"];

/// Everything needed to start the upload daemon pointed at this service.
#[derive(Debug, Clone)]
pub struct DaemonLaunch {
    pub program: String,
    pub upload_dir: PathBuf,
    pub hooks_url: Url,
    pub base_path: String,
    pub host: String,
    pub port: u16,
    pub forwarded_headers: Vec<String>,
    pub behind_proxy: bool,
    pub verbose: bool,
}

impl DaemonLaunch {
    /// Builds a launch description whose callback URL carries `secret`,
    /// replacing any `secret` already present in the query.
    pub fn new(upload_dir: PathBuf, hooks_http: &str, shared_secret: &str, port: u16) -> Result<Self> {
        let mut hooks_url = Url::parse(hooks_http)
            .with_context(|| format!("Invalid hooks URL: {}", hooks_http))?;
        set_query_parameter(&mut hooks_url, "secret", shared_secret);

        Ok(Self {
            program: "tusd".to_string(),
            upload_dir,
            hooks_url,
            base_path: DEFAULT_BASE_PATH.to_string(),
            host: DEFAULT_HOST.to_string(),
            port,
            forwarded_headers: FORWARDED_HEADERS.iter().map(|h| h.to_string()).collect(),
            behind_proxy: true,
            verbose: true,
        })
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            format!("-upload-dir={}", self.upload_dir.display()),
            format!("-hooks-http={}", self.hooks_url),
            format!("-base-path={}", self.base_path),
            format!("--hooks-enabled-events={}", HOOK_EVENTS.join(",")),
            format!("-port={}", self.port),
            format!("-host={}", self.host),
            format!(
                "-hooks-http-forward-headers={}",
                self.forwarded_headers.join(",")
            ),
        ];
        if self.behind_proxy {
            args.push("-behind-proxy".to_string());
        }
        if self.verbose {
            args.push("-verbose".to_string());
        }
        args
    }

    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(self.args());
        cmd
    }
}

fn set_query_parameter(url: &mut Url, name: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != name)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (k, v) in &kept {
        pairs.append_pair(k, v);
    }
    pairs.append_pair(name, value);
}
