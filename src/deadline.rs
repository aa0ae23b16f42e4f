//! Bounded execution for long-running external steps.
//!
//! Network fetches, clones and SBOM generation race against both a
//! caller-supplied timeout and a [`CancellationToken`]. Whichever fires
//! first drops the step's future, which kills any child process spawned
//! with `kill_on_drop`.

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

pub async fn bounded<T, F>(what: &str, limit: Duration, token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => bail!("{} cancelled", what),
        res = tokio::time::timeout(limit, fut) => match res {
            Ok(inner) => inner,
            Err(_) => bail!("{} timed out after {}s", what, limit.as_secs()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let token = CancellationToken::new();
        let v = bounded("step", Duration::from_secs(5), &token, async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let token = CancellationToken::new();
        let err = bounded("slow step", Duration::from_millis(20), &token, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("slow step timed out"));
    }

    #[tokio::test]
    async fn test_bounded_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let err = bounded("step", Duration::from_secs(5), &token, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
