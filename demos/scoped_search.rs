//! Shows how scoping a search to one document changes the results.
//!
//! ```sh
//! cargo run --example scoped_search
//! ```

use lessonrag::rag::Document;
use lessonrag::{Config, RagService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let service = RagService::from_config(Config::load_or_default()).await?;

    let lessons = [
        ("Trees", "Lesson: planting trees in the UAE. Students plant a ghaf seedling, water it and keep a growth diary."),
        ("Water", "Lesson: saving water at home. Students measure a running tap and design a poster about saving water."),
    ];

    let mut ids = Vec::new();
    for (title, text) in lessons {
        let handle = service.add_document(Document::new(title, text).with_language("en")).await?;
        ids.push((title, handle.document_id()));
        handle.wait().await?;
    }

    let query = "What do the students plant?";

    println!("Unscoped: {}", query);
    for result in service.search(query, None).await? {
        println!("  {:.3}  {}", result.score, result.content);
    }

    for (title, id) in ids {
        println!("\nScoped to {}:", title);
        let results = service.search(query, Some(id)).await?;
        if results.is_empty() {
            println!("  (nothing above the threshold; answers would use general guidance)");
        }
        for result in results {
            println!("  {:.3}  {}", result.score, result.content);
        }
    }

    let stats = service.stats().await?;
    println!("\n{} documents, {} chunks", stats.documents, stats.chunks);
    Ok(())
}
