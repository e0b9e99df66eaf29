use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use handoff_swarm::{
    HandoffToolConfig, Message, ModelAgentBuilder, RunContext, SwarmConfig, SwarmState,
    create_handoff_tool, create_swarm,
    llm::{CompletionResponse, ScriptedModel},
    tool::{FnTool, ToolError},
};

/// Bookings owned by the caller and shared with the tools.
#[derive(Debug, Default)]
struct Reservations {
    flights: HashMap<String, String>,
    hotels: HashMap<String, String>,
}

type SharedReservations = Arc<Mutex<Reservations>>;

fn book_flight(reservations: SharedReservations) -> FnTool {
    FnTool::new("book_flight", "Book a flight for the current user", move |args| {
        let flight_id = args["flight_id"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("flight_id is required".to_owned()))?;
        let mut reservations = reservations
            .lock()
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        reservations
            .flights
            .insert("user_123".to_owned(), flight_id.to_owned());
        Ok(format!("Successfully booked flight {flight_id}"))
    })
    .with_parameters(serde_json::json!({
        "type": "object",
        "properties": {"flight_id": {"type": "string"}},
        "required": ["flight_id"],
    }))
}

fn book_hotel(reservations: SharedReservations) -> FnTool {
    FnTool::new("book_hotel", "Book a hotel for the current user", move |args| {
        let hotel_name = args["hotel_name"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("hotel_name is required".to_owned()))?;
        let mut reservations = reservations
            .lock()
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        reservations
            .hotels
            .insert("user_123".to_owned(), hotel_name.to_owned());
        Ok(format!("Successfully booked a stay at {hotel_name}"))
    })
    .with_parameters(serde_json::json!({
        "type": "object",
        "properties": {"hotel_name": {"type": "string"}},
        "required": ["hotel_name"],
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_line_number(true)
        .with_file(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let reservations = SharedReservations::default();

    let flight_model = ScriptedModel::new([
        CompletionResponse::tool_call("book_flight", serde_json::json!({"flight_id": "UA922"})),
        CompletionResponse::text("Your flight UA922 is booked."),
        CompletionResponse::tool_call("transfer_to_hotel_assistant", serde_json::json!({})),
    ]);
    let hotel_model = ScriptedModel::new([
        CompletionResponse::tool_call(
            "book_hotel",
            serde_json::json!({"hotel_name": "McKittrick Hotel"}),
        ),
        CompletionResponse::text("You are staying at the McKittrick Hotel."),
    ]);

    let flight_assistant = ModelAgentBuilder::new_with_model(flight_model)
        .agent_name("flight_assistant")
        .system_prompt("You are a flight booking assistant.")
        .add_tool(book_flight(reservations.clone()))
        .add_tool(create_handoff_tool(
            HandoffToolConfig::new("hotel_assistant")
                .description("Transfer the user to the hotel-booking assistant."),
        ))
        .build()
        .into_swarm_agent();
    let hotel_assistant = ModelAgentBuilder::new_with_model(hotel_model)
        .agent_name("hotel_assistant")
        .system_prompt("You are a hotel booking assistant.")
        .add_tool(book_hotel(reservations.clone()))
        .add_tool(create_handoff_tool(
            HandoffToolConfig::new("flight_assistant")
                .description("Transfer the user to the flight-booking assistant."),
        ))
        .build()
        .into_swarm_agent();

    let swarm = create_swarm(
        SwarmConfig::builder()
            .agents(vec![flight_assistant, hotel_assistant])
            .default_active_agent("flight_assistant")
            .build(),
    )?
    .compile()?;

    let ctx = RunContext::new().with_thread_id("user_123");
    let mut state = SwarmState::default();
    let turns = [
        "I need a flight from BOS to JFK",
        "Now I need a hotel",
        "Book the McKittrick Hotel",
    ];
    for turn in turns {
        state.push_message(Message::user(turn));
        state = swarm.invoke(&ctx, state).await?;
        if let Some(message) = state.last_message() {
            println!("{message}");
        }
    }

    match reservations.lock() {
        Ok(reservations) => println!("{reservations:#?}"),
        Err(e) => eprintln!("reservations unavailable: {e}"),
    }
    Ok(())
}
