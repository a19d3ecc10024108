use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use spool_core::domain::{LogItem, TaskKey};
use spool_core::impls::{InMemoryBus, InMemoryLogProducer};
use spool_core::{SpoolConfig, TaskLogService, TaskLogServiceBuilder};
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;

const OWNER: &str = "demo";
const TASK: &str = "build";

/// 1 セッション分のログを表示する。`limit` 件で打ち切る（画面を閉じた想定）。
async fn show_session(service: &TaskLogService, label: &str, limit: Option<usize>) {
    println!("--- {label} ---");
    let mut log = service.stream_task_log(OWNER, TASK);
    let mut seen = 0;
    while let Some(item) = log.next().await {
        match item {
            LogItem::Chunk(text) => print!("{text}"),
            LogItem::LocalExhausted => println!("[cache replayed, fetching the rest]"),
            LogItem::Finished => println!("[finished, served from cache]"),
        }
        seen += 1;
        if limit.is_some_and(|limit| seen >= limit) {
            println!("[session closed early]");
            break;
        }
    }
    let position = service.position(OWNER, TASK).await.unwrap_or_default();
    println!("position={position}");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) 設定: 引数があれば TOML を読む
    let config = match std::env::args().nth(1) {
        Some(path) => SpoolConfig::load(&PathBuf::from(path))?,
        None => SpoolConfig::default(),
    };
    tracing::info!(?config, "starting");

    // (B) バスとジョブマスターの模擬
    let bus = Arc::new(InMemoryBus::new());
    let producer = Arc::new(InMemoryLogProducer::new(16));
    let responder = producer.clone().attach(&bus);

    let service = TaskLogServiceBuilder::from_config(bus.clone(), &config).build()?;
    service.clear_persistent_data().await;

    // (C) タスクがログを書き続ける
    let key = TaskKey::new(OWNER, TASK);
    let writer = {
        let producer = producer.clone();
        let key = key.clone();
        tokio::spawn(async move {
            for step in 1..=6 {
                producer
                    .append(&key, &format!("step {step}: compiling module {step}\n"))
                    .await;
                sleep(Duration::from_millis(50)).await;
            }
            producer.finish(&key).await;
        })
    };

    // (D) 途中で閉じ、開き直し、完了後にもう一度開く
    show_session(&service, "first view", Some(4)).await;
    show_session(&service, "second view", None).await;
    writer.await?;
    show_session(&service, "third view", None).await;

    drop(service);
    drop(bus);
    responder.await?;
    Ok(())
}
