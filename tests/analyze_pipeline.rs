// tests/analyze_pipeline.rs
//
// End-to-end analysis through the public library API with deterministic
// classifiers: input shapes, skip-on-failure, timeouts, batches, refinement
// and cancellation of in-flight requests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use conversation_sentiment::classifier::{
    ClassifierResult, FailingClassifier, FixedClassifier, LexiconClassifier, ScriptedClassifier,
    SlowClassifier,
};
use conversation_sentiment::{AnalysisResult, CorrectionOffset, SentimentAnalyzer, SentimentLevel};

fn probs(pos: f64, neg: f64, neu: f64) -> ClassifierResult {
    ClassifierResult::new(pos, neg, neu).expect("valid triple")
}

fn fixed(pos: f64, neg: f64, neu: f64) -> SentimentAnalyzer {
    SentimentAnalyzer::new(Arc::new(FixedClassifier::new(probs(pos, neg, neu))))
}

/// A customer thread with `n` scoreable messages.
fn long_thread(id: usize, n: usize) -> serde_json::Value {
    let messages: Vec<_> = (0..n)
        .map(|i| json!({"sender": "", "message": format!("Mensagem {i} da conversa {id}, ainda sem resposta")}))
        .collect();
    json!({"_id": format!("c-{id}"), "Full Conversation": messages})
}

#[tokio::test]
async fn strongly_positive_customer_thread() {
    let analyzer = fixed(0.9, 0.02, 0.08);
    let conv = json!({
        "_id": "c-1",
        "Full Conversation": [
            {"sender": "", "message": "Vocês resolveram tudo muito rápido!"},
            {"sender": "Agent", "message": "Fico feliz em ajudar"},
            {"message": "Excelente atendimento, obrigado"}
        ]
    });
    let r = analyzer.analyze(&conv).await;
    assert_eq!(r.score(), 94.0);
    assert!(matches!(
        r.sentiment_label(),
        SentimentLevel::Positive | SentimentLevel::VeryPositive
    ));
    let sum: f64 = r.level_scores().as_array().iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn empty_thread_is_exact_neutral_default() {
    let scripted = Arc::new(ScriptedClassifier::new().fallback(probs(0.9, 0.05, 0.05)));
    let analyzer = SentimentAnalyzer::new(scripted.clone());

    let r = analyzer.analyze(&json!({"Full Conversation": []})).await;
    assert_eq!(r, AnalysisResult::neutral_default());
    assert_eq!(r.score(), 50.0);
    assert_eq!(r.sentiment_label(), SentimentLevel::Neutral);
    assert_eq!(r.level_scores().get(SentimentLevel::Neutral), 1.0);
    assert_eq!(scripted.calls(), 0, "nothing to classify");
}

#[tokio::test]
async fn agent_only_and_short_messages_yield_no_snippets() {
    let scripted = Arc::new(ScriptedClassifier::new().fallback(probs(0.0, 0.9, 0.1)));
    let analyzer = SentimentAnalyzer::new(scripted.clone());
    let conv = json!({"Full Conversation": [
        {"sender": "bot", "message": "Olá! Como posso ajudar hoje?"},
        {"sender": "", "message": "ok"},
        {"sender": "", "message": "   sim   "}
    ]});
    assert_eq!(analyzer.analyze(&conv).await, AnalysisResult::neutral_default());
    assert_eq!(scripted.calls(), 0);
}

#[tokio::test]
async fn every_call_failing_degrades_to_neutral() {
    let analyzer = SentimentAnalyzer::new(Arc::new(FailingClassifier));
    let r = analyzer
        .analyze(&json!("O produto chegou quebrado. Quero meu dinheiro de volta agora. Isso é um absurdo total!"))
        .await;
    assert_eq!(r, AnalysisResult::neutral_default());
}

#[tokio::test]
async fn timed_out_calls_are_skipped() {
    let slow = SlowClassifier {
        delay: Duration::from_millis(300),
        fixed: probs(0.0, 0.9, 0.1),
    };
    let analyzer = SentimentAnalyzer::new(Arc::new(slow)).with_timeout(Duration::from_millis(20));
    let r = analyzer
        .analyze(&json!({"message": "Estou esperando há duas semanas"}))
        .await;
    assert_eq!(r, AnalysisResult::neutral_default());
}

#[tokio::test]
async fn one_angry_message_outweighs_calm_ones() {
    let scripted = ScriptedClassifier::new()
        .answer("Isso é inaceitável, vou cancelar tudo", probs(0.0, 0.95, 0.05))
        .fallback(probs(0.1, 0.1, 0.8));
    let analyzer = SentimentAnalyzer::new(Arc::new(scripted));
    let conv = json!({"Full Conversation": [
        {"sender": "", "message": "Bom dia, tudo bem?"},
        {"sender": "", "message": "Queria saber do meu pedido"},
        {"sender": "", "message": "Ele ainda não chegou"},
        {"sender": "", "message": "Isso é inaceitável, vou cancelar tudo"}
    ]});
    let r = analyzer.analyze(&conv).await;
    assert!(r.score() < 25.0, "score = {}", r.score());
    assert!(r.sentiment_label().is_negative());
}

#[tokio::test]
async fn transcript_windows_feed_the_classifier() {
    let scripted = Arc::new(ScriptedClassifier::new().fallback(probs(0.6, 0.1, 0.3)));
    let analyzer = SentimentAnalyzer::new(scripted.clone());
    let transcript = "Cliente ligou sobre a fatura de março. Explicamos a cobrança duplicada. \
                      O estorno foi aprovado hoje. Cliente agradeceu bastante pelo retorno. \
                      Ligação encerrada sem pendências.";
    let r = analyzer.analyze(&json!(transcript)).await;
    assert_eq!(scripted.calls(), 2, "five sentences make two windows");
    assert_eq!(r.score(), 75.0);
}

#[tokio::test]
async fn lexicon_classifier_orders_conversations() {
    let analyzer = SentimentAnalyzer::new(Arc::new(LexiconClassifier::new()));
    let happy = analyzer
        .analyze(&json!({"message": "Adorei o atendimento, muito obrigado, excelente!"}))
        .await;
    let angry = analyzer
        .analyze(&json!({"message": "Péssimo serviço, horrível, estou muito irritado"}))
        .await;
    assert!(happy.score() > 50.0);
    assert!(angry.score() < 50.0);
    assert!(happy.score() > angry.score());
}

#[tokio::test]
async fn batch_preserves_order_and_applies_offset() {
    let scripted = ScriptedClassifier::new()
        .answer("Muito bom, gostei bastante", probs(0.8, 0.05, 0.15))
        .answer("Muito ruim, detestei tudo", probs(0.05, 0.8, 0.15))
        .fallback(probs(0.2, 0.2, 0.6));
    let analyzer = Arc::new(SentimentAnalyzer::new(Arc::new(scripted)));

    let batch = vec![
        json!({"message": "Muito bom, gostei bastante"}),
        json!({"message": "Muito ruim, detestei tudo"}),
        json!({"message": "Queria uma informação"}),
        json!(null),
    ];

    let plain = analyzer.analyze_batch(batch.clone(), None, 2).await;
    assert_eq!(plain.len(), 4);
    assert_eq!(plain[0].score(), 87.5);
    assert_eq!(plain[1].score(), 12.5);
    assert_eq!(plain[2].score(), 50.0);
    assert_eq!(plain[3], AnalysisResult::neutral_default());
    assert!(plain.iter().all(|r| !r.is_refined()));

    let offset = CorrectionOffset {
        score_offset: 14.29,
        label_shifts: BTreeMap::new(),
        count: 3,
    };
    let refined = analyzer.analyze_batch(batch, Some(offset), 2).await;
    assert_eq!(refined[2].score(), 64.3);
    assert_eq!(refined[2].sentiment_label(), SentimentLevel::SlightlyPositive);
    assert_eq!(refined[0].score(), 100.0);
    assert!(refined.iter().all(AnalysisResult::is_refined));
}

#[tokio::test]
async fn inactive_offset_changes_nothing() {
    let analyzer = fixed(0.6, 0.1, 0.3);
    let conv = json!({"message": "Atendimento razoável"});
    let plain = analyzer.analyze(&conv).await;
    let refined = analyzer.analyze_refined(&conv, &CorrectionOffset::zero()).await;
    assert_eq!(plain, refined);
}

#[tokio::test]
async fn abandoned_request_stops_classifying() {
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .fallback(probs(0.1, 0.7, 0.2))
            .delay(Duration::from_millis(50)),
    );
    let analyzer = SentimentAnalyzer::new(classifier.clone());
    let conv = long_thread(1, 6);

    let outcome = tokio::time::timeout(Duration::from_millis(120), analyzer.analyze(&conv)).await;
    assert!(outcome.is_err(), "request should still be in flight");

    tokio::time::sleep(Duration::from_millis(10)).await;
    let at_abort = classifier.calls();
    assert!((1..6).contains(&at_abort), "calls at abort: {at_abort}");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(classifier.calls(), at_abort);
}

#[tokio::test]
async fn aborted_batch_stops_all_workers() {
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .fallback(probs(0.6, 0.1, 0.3))
            .delay(Duration::from_millis(50)),
    );
    let analyzer = Arc::new(SentimentAnalyzer::new(classifier.clone()));
    let batch: Vec<_> = (0..4).map(|id| long_thread(id, 5)).collect();

    let handle = tokio::spawn({
        let analyzer = Arc::clone(&analyzer);
        async move { analyzer.analyze_batch(batch, None, 2).await }
    });
    tokio::time::sleep(Duration::from_millis(120)).await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    tokio::time::sleep(Duration::from_millis(10)).await;
    let at_abort = classifier.calls();
    assert!((1..20).contains(&at_abort), "calls at abort: {at_abort}");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(classifier.calls(), at_abort);
}

#[tokio::test]
async fn slow_scripted_classifier_still_completes() {
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .fallback(probs(0.6, 0.1, 0.3))
            .delay(Duration::from_millis(5)),
    );
    let analyzer = SentimentAnalyzer::new(classifier.clone());
    let r = analyzer.analyze(&long_thread(2, 3)).await;
    assert_eq!(classifier.calls(), 3);
    assert!(r.score() > 50.0);
}
