//! Ingests a short lesson plan and asks a question about it.
//!
//! Needs a configured provider (`config.yaml`, or `OPENAI_API_KEY` for the
//! defaults):
//!
//! ```sh
//! cargo run --example ingest_and_ask
//! ```

use lessonrag::chat::AskRequest;
use lessonrag::rag::{Document, DocumentMetadata};
use lessonrag::{Config, RagService};

const LESSON: &str = "خطة درس: الألوان للصف الأول.\n\
الأهداف: أن يتعرف الطفل على الألوان الأساسية ويسميها باللغة العربية.\n\
الأنشطة: بطاقات ملونة، أغنية الألوان، رسم قوس قزح، لعبة ابحث عن اللون في الصف.\n\
التقييم: يشير الطفل إلى اللون الصحيح عند سماع اسمه.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lessonrag_core=info".parse()?),
        )
        .init();

    let service = RagService::from_config(Config::load_or_default()).await?;

    let document = Document::new("الألوان", LESSON).with_metadata(DocumentMetadata {
        subject: Some("اللغة العربية".into()),
        age_group: Some("6-7".into()),
        tags: vec!["ألوان".into()],
    });

    let handle = service.add_document(document).await?;
    let document_id = handle.document_id();
    let report = handle.wait().await?;
    println!("Ingestion {}: {} of {} chunks written\n", report.state, report.written, report.total_chunks);

    let answer = service
        .ask_stream(
            AskRequest::new("ما هي الأنشطة المقترحة في هذا الدرس؟").scoped_to(document_id),
            |chunk| print!("{}", chunk),
        )
        .await;

    println!("\n\ngrounded: {}, sources: {}", answer.grounded, answer.sources.len());
    Ok(())
}
