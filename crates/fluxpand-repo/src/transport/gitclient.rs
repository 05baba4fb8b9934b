//! Git client interface and the `git` CLI implementation

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use url::Url;

use fluxpand_core::CancellationToken;
use semver::{Version, VersionReq};

use crate::credentials::RepositoryCreds;
use crate::error::{RepoError, Result};
use crate::source::GitReference;

/// Authentication material for a clone, derived from the credential store
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    /// URL scheme the options were built for
    pub transport: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bearer_token: Option<String>,
    /// Private SSH key (PEM)
    pub identity: Option<String>,
    /// Host-key pins
    pub known_hosts: Option<String>,
}

impl AuthOptions {
    /// Build and validate auth options for a repository URL
    ///
    /// SSH transports require both `identity` and `known_hosts`; the
    /// resulting error names the missing key.
    pub fn new(url: &Url, creds: Option<&RepositoryCreds>) -> Result<Self> {
        let get = |key: &str| {
            creds
                .and_then(|c| c.get(key))
                .map(str::to_string)
        };
        let options = Self {
            transport: url.scheme().to_string(),
            username: get("username"),
            password: get("password"),
            bearer_token: get("token"),
            identity: get("identity"),
            known_hosts: get("known_hosts"),
        };
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<()> {
        if self.transport == "ssh" {
            if self.identity.is_none() {
                return Err(RepoError::InvalidAuth {
                    transport: self.transport.clone(),
                    message: "'identity' is required".to_string(),
                });
            }
            if self.known_hosts.is_none() {
                return Err(RepoError::InvalidAuth {
                    transport: self.transport.clone(),
                    message: "'known_hosts' is required".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Checkout target for a clone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutStrategy {
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub semver: Option<String>,
    pub ref_name: Option<String>,
    pub commit: Option<String>,
}

impl CheckoutStrategy {
    /// Derive the checkout strategy from a repository document reference
    ///
    /// An absent or fully-unspecified reference checks out branch `master`.
    pub fn from_reference(reference: Option<&GitReference>) -> Self {
        match reference {
            Some(reference) if !reference.is_unspecified() => Self {
                branch: reference.branch.clone(),
                tag: reference.tag.clone(),
                semver: reference.semver.clone(),
                ref_name: reference.name.clone(),
                commit: reference.commit.clone(),
            },
            _ => Self {
                branch: Some("master".to_string()),
                ..Default::default()
            },
        }
    }
}

/// Clone configuration handed to the client
#[derive(Debug, Clone, Default)]
pub struct CloneConfig {
    pub shallow: bool,
    pub single_branch: bool,
    pub checkout: CheckoutStrategy,
}

/// Result of a completed clone
#[derive(Debug, Clone)]
pub struct GitCommit {
    pub hash: String,
}

/// The clone operation the Git loader depends on
pub trait GitClient {
    fn clone_repository(
        &self,
        ctx: &CancellationToken,
        repo_url: &str,
        config: &CloneConfig,
    ) -> Result<GitCommit>;
}

/// Creates a client bound to a target path and auth material
pub trait GitClientFactory {
    fn create(&self, path: &Path, auth: &AuthOptions) -> Result<Box<dyn GitClient>>;
}

/// Factory for the `git` CLI client
#[derive(Debug, Default)]
pub struct CommandGitClientFactory;

impl GitClientFactory for CommandGitClientFactory {
    fn create(&self, path: &Path, auth: &AuthOptions) -> Result<Box<dyn GitClient>> {
        Ok(Box::new(CommandGitClient {
            path: path.to_path_buf(),
            auth: auth.clone(),
        }))
    }
}

/// Clones by spawning the `git` binary
struct CommandGitClient {
    path: PathBuf,
    auth: AuthOptions,
}

impl GitClient for CommandGitClient {
    fn clone_repository(
        &self,
        ctx: &CancellationToken,
        repo_url: &str,
        config: &CloneConfig,
    ) -> Result<GitCommit> {
        ctx.check().map_err(RepoError::Core)?;

        let scratch = tempfile::tempdir().map_err(RepoError::Io)?;
        let clone_url = self.authenticated_url(repo_url)?;
        let mut args: Vec<String> = vec!["clone".to_string(), "--quiet".to_string()];

        let mut post_checkout: Option<String> = None;
        let checkout = &config.checkout;
        if let Some(commit) = &checkout.commit {
            // A commit cannot be named on the clone command line; fetch the
            // branch history and check the commit out afterwards.
            post_checkout = Some(commit.clone());
        } else {
            if config.shallow {
                args.push("--depth".to_string());
                args.push("1".to_string());
            }
            let target = self.resolve_clone_target(ctx, repo_url, checkout)?;
            if let Some(target) = target {
                args.push("--branch".to_string());
                args.push(target);
            }
        }
        if config.single_branch {
            args.push("--single-branch".to_string());
        }
        args.push(clone_url);
        args.push(self.path.to_string_lossy().into_owned());

        self.run_git(ctx, &args, scratch.path(), repo_url)?;

        if let Some(commit) = post_checkout {
            self.run_git(
                ctx,
                &[
                    "-C".to_string(),
                    self.path.to_string_lossy().into_owned(),
                    "checkout".to_string(),
                    "--quiet".to_string(),
                    commit,
                ],
                scratch.path(),
                repo_url,
            )?;
        }

        let head = self.run_git(
            ctx,
            &[
                "-C".to_string(),
                self.path.to_string_lossy().into_owned(),
                "rev-parse".to_string(),
                "HEAD".to_string(),
            ],
            scratch.path(),
            repo_url,
        )?;
        Ok(GitCommit {
            hash: head.trim().to_string(),
        })
    }
}

impl CommandGitClient {
    /// Embed basic auth into an HTTPS clone URL
    fn authenticated_url(&self, repo_url: &str) -> Result<String> {
        let mut url = Url::parse(repo_url).map_err(|e| RepoError::InvalidRepositoryUrl {
            url: repo_url.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme().starts_with("http") {
            if let (Some(username), Some(password)) =
                (self.auth.username.as_deref(), self.auth.password.as_deref())
            {
                url.set_username(username).ok();
                url.set_password(Some(password)).ok();
            }
        }
        Ok(url.to_string())
    }

    /// Translate the checkout strategy into a `--branch` argument
    ///
    /// `semver` references list remote tags and pick the highest matching
    /// version; `name` references use their short form.
    fn resolve_clone_target(
        &self,
        ctx: &CancellationToken,
        repo_url: &str,
        checkout: &CheckoutStrategy,
    ) -> Result<Option<String>> {
        if let Some(branch) = &checkout.branch {
            return Ok(Some(branch.clone()));
        }
        if let Some(tag) = &checkout.tag {
            return Ok(Some(tag.clone()));
        }
        if let Some(ref_name) = &checkout.ref_name {
            let short = ref_name
                .trim_start_matches("refs/heads/")
                .trim_start_matches("refs/tags/");
            return Ok(Some(short.to_string()));
        }
        if let Some(semver) = &checkout.semver {
            let requirement =
                VersionReq::parse(semver).map_err(|e| RepoError::GitClone {
                    url: repo_url.to_string(),
                    message: format!("invalid semver reference {:?}: {}", semver, e),
                })?;
            let scratch = tempfile::tempdir().map_err(RepoError::Io)?;
            let output = self.run_git(
                ctx,
                &[
                    "ls-remote".to_string(),
                    "--tags".to_string(),
                    "--refs".to_string(),
                    self.authenticated_url(repo_url)?,
                ],
                scratch.path(),
                repo_url,
            )?;
            let best = output
                .lines()
                .filter_map(|line| line.split("refs/tags/").nth(1))
                .filter_map(|tag| {
                    Version::parse(tag.trim_start_matches('v'))
                        .ok()
                        .filter(|v| requirement.matches(v))
                        .map(|v| (v, tag.to_string()))
                })
                .max_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(_, tag)| tag);
            return best.map(Some).ok_or_else(|| RepoError::GitClone {
                url: repo_url.to_string(),
                message: format!("no tag matches semver reference {:?}", semver),
            });
        }
        Ok(None)
    }

    fn run_git(
        &self,
        ctx: &CancellationToken,
        args: &[String],
        scratch: &Path,
        repo_url: &str,
    ) -> Result<String> {
        ctx.check().map_err(RepoError::Core)?;

        let mut command = Command::new("git");
        if let Some(token) = &self.auth.bearer_token {
            command.arg("-c");
            command.arg(format!("http.extraHeader=Authorization: Bearer {}", token));
        }
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0");

        if self.auth.transport == "ssh" {
            let ssh_command = self.write_ssh_material(scratch)?;
            command.env("GIT_SSH_COMMAND", ssh_command);
        }

        let mut child = command.spawn().map_err(|e| RepoError::GitClone {
            url: repo_url.to_string(),
            message: format!("unable to spawn git: {}", e),
        })?;

        // Poll for completion so the cancellation token's deadline holds.
        loop {
            if ctx.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RepoError::Core(fluxpand_core::CoreError::Cancelled));
            }
            match child.try_wait().map_err(RepoError::Io)? {
                Some(_) => break,
                None => std::thread::sleep(Duration::from_millis(50)),
            }
        }

        let output = child.wait_with_output().map_err(RepoError::Io)?;
        if !output.status.success() {
            return Err(RepoError::GitClone {
                url: repo_url.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Write the SSH identity and known_hosts into the scratch directory and
    /// compose the matching `GIT_SSH_COMMAND`
    fn write_ssh_material(&self, scratch: &Path) -> Result<String> {
        let identity_path = scratch.join("identity");
        let known_hosts_path = scratch.join("known_hosts");

        let mut identity = std::fs::OpenOptions::new();
        identity.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            identity.mode(0o600);
        }
        let mut identity_file = identity.open(&identity_path).map_err(RepoError::Io)?;
        identity_file
            .write_all(self.auth.identity.as_deref().unwrap_or_default().as_bytes())
            .map_err(RepoError::Io)?;
        std::fs::write(
            &known_hosts_path,
            self.auth.known_hosts.as_deref().unwrap_or_default(),
        )
        .map_err(RepoError::Io)?;

        Ok(format!(
            "ssh -i {} -o UserKnownHostsFile={} -o IdentitiesOnly=yes",
            identity_path.display(),
            known_hosts_path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(pairs: &[(&str, &str)]) -> RepositoryCreds {
        let mut creds = RepositoryCreds::default();
        for (key, value) in pairs {
            creds
                .credentials
                .insert(key.to_string(), value.to_string());
        }
        creds
    }

    #[test]
    fn test_auth_options_ssh_requires_identity() {
        let url = Url::parse("ssh://git@localhost/dummy.git").unwrap();
        let err = AuthOptions::new(&url, None).unwrap_err();
        assert!(err.to_string().contains("'identity' is required"));

        let with_identity = creds(&[("identity", "key")]);
        let err = AuthOptions::new(&url, Some(&with_identity)).unwrap_err();
        assert!(err.to_string().contains("'known_hosts' is required"));

        let complete = creds(&[("identity", "key"), ("known_hosts", "pin")]);
        assert!(AuthOptions::new(&url, Some(&complete)).is_ok());
    }

    #[test]
    fn test_auth_options_https_allows_anonymous() {
        let url = Url::parse("https://localhost/dummy.git").unwrap();
        let options = AuthOptions::new(&url, None).unwrap();
        assert_eq!(options.transport, "https");
        assert!(options.username.is_none());
    }

    #[test]
    fn test_checkout_strategy_defaults_to_master() {
        let strategy = CheckoutStrategy::from_reference(None);
        assert_eq!(strategy.branch.as_deref(), Some("master"));

        let unspecified = GitReference::default();
        let strategy = CheckoutStrategy::from_reference(Some(&unspecified));
        assert_eq!(strategy.branch.as_deref(), Some("master"));
    }

    #[test]
    fn test_checkout_strategy_copies_reference() {
        let reference = GitReference {
            tag: Some("v1.2.3".to_string()),
            ..Default::default()
        };
        let strategy = CheckoutStrategy::from_reference(Some(&reference));
        assert_eq!(strategy.tag.as_deref(), Some("v1.2.3"));
        assert!(strategy.branch.is_none());
    }
}
