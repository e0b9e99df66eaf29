use anyhow::Result;
use handoff_swarm::{
    Message, ModelAgentBuilder, RunContext, SwarmConfig, SwarmState, create_swarm,
    llm::{CompletionResponse, ScriptedModel},
    tool::{FnTool, ToolError},
};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_line_number(true)
        .with_file(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Scripted replies stand in for a real provider.
    let alice_model = ScriptedModel::new([
        CompletionResponse::tool_call("add", serde_json::json!({"a": 3, "b": 5})),
        CompletionResponse::text("3 + 5 is 8."),
        CompletionResponse::tool_call("transfer_to_bob", serde_json::json!({})),
    ]);
    let bob_model =
        ScriptedModel::new([CompletionResponse::text("Arr, Bob the pirate at yer service!")]);

    let add = FnTool::new("add", "Add two numbers", |args| {
        match (args["a"].as_i64(), args["b"].as_i64()) {
            (Some(a), Some(b)) => Ok((a + b).to_string()),
            _ => Err(ToolError::InvalidArguments("expected integers a and b".to_owned())),
        }
    });

    let alice = ModelAgentBuilder::new_with_model(alice_model)
        .agent_name("Alice")
        .system_prompt("You are Alice, an addition expert.")
        .add_tool(add)
        .handoff_to("Bob")
        .build()
        .into_swarm_agent();
    let bob = ModelAgentBuilder::new_with_model(bob_model)
        .agent_name("Bob")
        .system_prompt("You are Bob, you speak like a pirate.")
        .handoff_to("Alice")
        .build()
        .into_swarm_agent();

    let swarm = create_swarm(
        SwarmConfig::builder()
            .agents(vec![alice, bob])
            .default_active_agent("Alice")
            .build(),
    )?;
    println!("{}", swarm.to_dot());
    let swarm = swarm.compile()?;

    let ctx = RunContext::new().with_thread_id("basic-demo");
    let mut state = SwarmState::default();
    for prompt in ["What is 3 + 5?", "I'd like to talk to Bob", "Ahoy!"] {
        state.push_message(Message::user(prompt));
        state = swarm.invoke(&ctx, state).await?;
        println!(
            "[active: {}] {}",
            state.active_agent().unwrap_or("Alice"),
            state.last_message().map(ToString::to_string).unwrap_or_default()
        );
    }

    Ok(())
}
