use finreport_agent::{
    agent::{
        executor::TaskExecutor, planner::LlmPlanner, reflector::Reflector, replanner::Replanner,
        synthesizer::Synthesizer, AgentLoop,
    },
    config::AgentConfig,
    llm::ScriptedLanguageModel,
    memory::{ConversationHistory, MemoryStore},
    models::{Segment, SegmentType},
    retrieval::{
        reranker::{LexicalRelevanceModel, Reranker},
        router::IntentRouter,
        store::{HashedBowEmbedder, InMemorySegmentStore},
        strategies::RetrievalStrategies,
        SmartRetriever,
    },
    tools::create_default_registry,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Financial report agent starting");

    let config = AgentConfig::from_env();

    // Seed the report index with a few segments
    let store = Arc::new(InMemorySegmentStore::new(Box::new(HashedBowEmbedder::new(
        256,
    ))));
    store
        .insert(Segment::new(
            "原材料价格波动和海外政策变化构成公司的主要经营风险。",
            SegmentType::Risk,
            vec!["风险提示".to_string()],
            Some(42),
        ))
        .await;
    store
        .insert(Segment::new(
            "报告认为动力电池行业将维持高速增长，公司市占率持续领先。",
            SegmentType::Summary,
            vec!["摘要".to_string()],
            Some(1),
        ))
        .await;
    store
        .insert(Segment::new(
            "2024年公司动力电池出货量同比增长35%，储能业务收入翻倍。",
            SegmentType::Section,
            vec!["经营分析".to_string(), "出货量".to_string()],
            Some(12),
        ))
        .await;

    // Scripted model: one chat turn, then one retrieval turn. Swap in
    // GeminiClient::new(&config.llm)? for live runs.
    let llm: Arc<dyn finreport_agent::llm::LanguageModel> = Arc::new(ScriptedLanguageModel::new([
        // Turn 1: greeting handled without a plan
        r#"{"plan": null, "chat_response": "您好！我可以帮您分析研报内容，请问有什么问题？"}"#,
        // Turn 2: a single retrieval task
        r#"{"plan": {"thought": "The user asks about risks, one report search suffices.", "tasks": [
            {"task_id": 1, "tool_name": "search_financial_reports", "tool_args": {"query": "公司的主要风险"}, "question": "公司面临哪些主要风险？"}
        ]}, "chat_response": null}"#,
        // Intent classification for that search
        r#"{"mode": "risk", "term": null}"#,
        // Reflection on the tool result
        r#"{"assessment": "success", "reasoning": "The search returned risk disclosures.", "suggestion_for_next_step": null, "is_sufficient": true}"#,
        // Final synthesis
        "根据研报风险提示，公司的主要风险是原材料价格波动和海外政策变化。",
    ]));

    let retriever = Arc::new(SmartRetriever::new(
        IntentRouter::new(llm.clone()),
        RetrievalStrategies::new(store, config.retrieval.clone()),
        Reranker::new(Box::new(LexicalRelevanceModel)),
    ));

    let registry = Arc::new(create_default_registry(&config, retriever));
    let tool_catalog = registry
        .list()
        .into_iter()
        .map(|(name, desc)| (name.to_string(), desc.to_string()))
        .collect();

    let agent = AgentLoop::new(
        Box::new(LlmPlanner::new(llm.clone(), tool_catalog)),
        TaskExecutor::new(registry, config.limits.tool_timeout),
        Reflector::new(llm.clone()),
        Replanner::new(llm.clone()),
        Synthesizer::new(llm),
        config.limits.clone(),
    );

    let memories = MemoryStore::new();
    let user_id = "demo-user";
    memories
        .maybe_remember(user_id, "记住我重点关注宁德时代")
        .await?;

    let mut history = ConversationHistory::new(20);

    for query in ["你好", "这份研报里公司的主要风险有哪些？"] {
        let recalled = memories.formatted_for_prompt(user_id, query, 3).await;
        let outcome = agent
            .run_turn(query, &history.formatted_context(), &recalled)
            .await?;

        history.push_user(query);
        history.push_assistant(outcome.reply.clone());

        println!("\n=== TURN ===");
        println!("Q: {}", query);
        println!("A: {}", outcome.reply);
        println!("States: {:?}", outcome.states);
        if let Some(plan) = outcome.plan {
            println!("Plan thought: {}", plan.thought);
            for task in &plan.tasks {
                println!(
                    "  [{}] {} -> {:?}: {}",
                    task.task_id,
                    task.tool_name,
                    task.status,
                    task.result.as_deref().unwrap_or("<none>")
                );
            }
        }
    }

    Ok(())
}
