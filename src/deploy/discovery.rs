// ABOUTME: Scoped pause of the service discovery component.
// ABOUTME: Discovery is resumed on every exit path, including errors and panics.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{error, info};

use crate::runtime::ReplicaOps;

use super::error::DeployError;

/// Run `operation` with service discovery stopped.
///
/// Discovery is resumed whatever the outcome of `operation`. A failure of
/// the operation takes precedence over a failure to resume; a panic is
/// re-raised once discovery is back.
pub async fn with_discovery_paused<R, F, T>(runtime: &R, operation: F) -> Result<T, DeployError>
where
    R: ReplicaOps + ?Sized,
    F: Future<Output = Result<T, DeployError>>,
{
    info!("pausing service discovery");
    if let Err(e) = runtime.pause_discovery().await {
        resume(runtime).await;
        return Err(e.into());
    }

    let outcome = AssertUnwindSafe(operation).catch_unwind().await;

    info!("resuming service discovery");
    let resumed = runtime.resume_discovery().await;

    match outcome {
        Err(panic) => {
            if let Err(e) = resumed {
                error!(error = %e, "failed to resume service discovery");
            }
            std::panic::resume_unwind(panic)
        }
        Ok(Err(e)) => {
            if let Err(resume_err) = resumed {
                error!(error = %resume_err, "failed to resume service discovery");
            }
            Err(e)
        }
        Ok(Ok(value)) => {
            resumed?;
            Ok(value)
        }
    }
}

async fn resume<R: ReplicaOps + ?Sized>(runtime: &R) {
    if let Err(e) = runtime.resume_discovery().await {
        error!(error = %e, "failed to resume service discovery");
    }
}
