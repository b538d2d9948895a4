use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams, ListParams};
use kube::Client;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, RotationError};
use crate::models::{Candidate, CandidateSet};

/// Captured result of a command run inside a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait PodObserver: Send + Sync {
    /// List pods matching `label_selector` across all namespaces.
    async fn list_candidates(&self, label_selector: &str) -> Result<CandidateSet>;
}

#[async_trait]
pub trait PodExecutor: Send + Sync {
    /// Run `/bin/sh -c <script>` in the target pod and capture its output.
    async fn exec(&self, target: &Candidate, script: &str) -> Result<ExecOutput>;
}

/// Kubernetes-backed observer and executor.
pub struct KubePlatform {
    client: Client,
    call_timeout: Duration,
}

impl KubePlatform {
    pub fn new(client: Client, call_timeout: Duration) -> Self {
        Self {
            client,
            call_timeout,
        }
    }

    /// Build a client from the ambient environment: the in-cluster service
    /// account when running in a pod, otherwise the local kubeconfig.
    pub async fn try_default(call_timeout: Duration) -> Result<Self> {
        let client = Client::try_default().await.map_err(|e| {
            RotationError::PlatformUnavailable(format!("failed to build kube client: {e}"))
        })?;
        Ok(Self::new(client, call_timeout))
    }
}

#[async_trait]
impl PodObserver for KubePlatform {
    async fn list_candidates(&self, label_selector: &str) -> Result<CandidateSet> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let params = ListParams::default().labels(label_selector);
        let list = tokio::time::timeout(self.call_timeout, pods.list(&params))
            .await
            .map_err(|_| {
                RotationError::PlatformUnavailable(format!(
                    "listing pods timed out after {:?}",
                    self.call_timeout
                ))
            })?
            .map_err(|e| RotationError::PlatformUnavailable(format!("failed to list pods: {e}")))?;

        Ok(list.items.iter().filter_map(candidate_from_pod).collect())
    }
}

#[async_trait]
impl PodExecutor for KubePlatform {
    async fn exec(&self, target: &Candidate, script: &str) -> Result<ExecOutput> {
        let exec_failed = |reason: String| RotationError::RemoteExecFailed {
            step: "exec".into(),
            target: target.target_label(),
            reason,
        };

        tokio::time::timeout(self.call_timeout, self.exec_inner(target, script))
            .await
            .map_err(|_| exec_failed(format!("timed out after {:?}", self.call_timeout)))?
            .map_err(exec_failed)
    }
}

impl KubePlatform {
    async fn exec_inner(
        &self,
        target: &Candidate,
        script: &str,
    ) -> std::result::Result<ExecOutput, String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let params = AttachParams::default()
            .stdin(false)
            .stdout(true)
            .stderr(true)
            .tty(false);
        let mut attached = pods
            .exec(&target.name, ["/bin/sh", "-c", script], &params)
            .await
            .map_err(|e| format!("failed to start exec: {e}"))?;

        let stdout = attached.stdout();
        let stderr = attached.stderr();
        let status = attached.take_status();
        let (stdout, stderr) = tokio::join!(drain(stdout), drain(stderr));
        let status = match status {
            Some(status) => status.await,
            None => None,
        };
        attached
            .join()
            .await
            .map_err(|e| format!("exec stream closed abnormally: {e}"))?;

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code: status.as_ref().map(exit_code_from_status),
        })
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        // Partial output is still useful for the log line
        let _ = reader.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}

fn candidate_from_pod(pod: &Pod) -> Option<Candidate> {
    let name = pod.metadata.name.as_deref()?;
    let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
    let address = pod
        .status
        .as_ref()
        .and_then(|s| s.pod_ip.as_deref())
        .filter(|ip| !ip.is_empty());
    Some(Candidate::new(name, namespace, address))
}

/// The exec channel reports completion as a `Status`; non-zero exits carry
/// the code in an `ExitCode` cause.
fn exit_code_from_status(status: &Status) -> i32 {
    if status.status.as_deref() == Some("Success") {
        return 0;
    }
    status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .and_then(|c| c.message.as_deref())
                .and_then(|m| m.parse().ok())
        })
        .unwrap_or(-1)
}
