//! Smol runtime spawner

use crate::{BoxedTask, Spawner};

/// Spawner backed by the smol global executor
#[derive(Debug, Clone, Copy, Default)]
pub struct SmolSpawner;

impl Spawner for SmolSpawner {
    fn spawn(&self, future: BoxedTask) {
        ::smol::spawn(future).detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[smol_potat::test]
    async fn test_smol_spawner() {
        let spawner = SmolSpawner;
        let (tx, rx) = async_channel::bounded(1);

        spawner.spawn(Box::pin(async move {
            tx.send(42).await.unwrap();
        }));

        assert_eq!(rx.recv().await.unwrap(), 42);
    }

    #[smol_potat::test]
    async fn test_detached_task_outlives_caller_scope() {
        let (tx, rx) = async_channel::bounded(1);

        {
            let spawner = SmolSpawner;
            spawner.spawn(Box::pin(async move {
                ::smol::Timer::after(std::time::Duration::from_millis(10)).await;
                tx.send("done").await.unwrap();
            }));
        }

        assert_eq!(rx.recv().await.unwrap(), "done");
    }
}
