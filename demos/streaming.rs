use anyhow::Result;
use futures::TryStreamExt;
use handoff_swarm::{
    Message, ModelAgentBuilder, RunContext, SwarmConfig, SwarmState, create_streaming_swarm,
    llm::{CompletionResponse, ScriptedModel},
};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_line_number(true)
        .with_file(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let triage = ModelAgentBuilder::new_with_model(ScriptedModel::new([
        CompletionResponse::text("Let me find the right person for that.")
            .with_tool_call("transfer_to_billing", serde_json::json!({})),
    ]))
    .agent_name("Triage")
    .system_prompt("Route the user to the right specialist.")
    .handoff_to("Billing")
    .handoff_to("Tech Support")
    .build()
    .into_swarm_agent();

    let billing = ModelAgentBuilder::new_with_model(ScriptedModel::new([
        CompletionResponse::text("Your last invoice was paid on time. Anything else?"),
    ]))
    .agent_name("Billing")
    .system_prompt("You answer billing questions.")
    .handoff_to("Triage")
    .build()
    .into_swarm_agent();

    let tech_support = ModelAgentBuilder::new_with_model(ScriptedModel::default())
        .agent_name("Tech Support")
        .build()
        .into_swarm_agent();

    let swarm = create_streaming_swarm(
        SwarmConfig::builder()
            .agents(vec![triage, billing, tech_support])
            .default_active_agent("Triage")
            .recursion_limit(10)
            .build(),
    )?
    .compile()?;

    let ctx = RunContext::new();
    let state = SwarmState::new(vec![Message::user("Was my last invoice paid?")]);

    let mut steps = swarm.stream(&ctx, state);
    while let Some(event) = steps.try_next().await? {
        println!("step {} [{}]", event.step, event.node);
        if let Some(message) = event.state.last_message() {
            println!("  {message}");
        }
    }

    Ok(())
}
