//! Scenario command implementation.

use convsync_engine::{AllowAll, TransferableEntity};
use convsync_protocol::{PollRequest, StartConversationRequest, TransferBatch};
use convsync_server::{ConversationServer, ServerConfig};
use serde::Serialize;

use super::model::{Operator, Record};

/// Result of the scenario run.
#[derive(Debug, Serialize)]
pub struct ScenarioResult {
    /// Conversation number.
    pub conversation: u32,
    /// Batch drained after the first disclosure.
    pub first: TransferBatch,
    /// Batch drained after disclosing the unchanged master again.
    pub second: TransferBatch,
    /// Entities the client holds after both drains.
    pub remote_entities: usize,
}

/// Runs the scenario command.
pub fn run(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let server: ConversationServer<Operator, Record> =
        ConversationServer::new(ServerConfig::default(), AllowAll);
    let session_id = server.open_session(Operator("cli".to_string()));
    let number = server
        .handle_start_conversation(StartConversationRequest::new(session_id))?
        .conversation_number;
    let conversation = server.conversation(session_id, number)?;

    let slave = Record::new("Item", "B").with_field("label", "slave");
    let master = Record::new("Order", "A").with_field("label", "master");
    master.link(&slave);

    let mut drains = Vec::with_capacity(2);
    for _ in 0..2 {
        conversation.disclose(&master)?;
        let response = server.handle_poll(PollRequest::new(session_id, number))?;
        if let Some(error) = response.error {
            return Err(error.into());
        }
        drains.push(response.batch.ok_or("Conversation transfers no entity data")?);
    }

    let second = drains.pop().ok_or("Missing second drain")?;
    let first = drains.pop().ok_or("Missing first drain")?;
    let result = ScenarioResult {
        conversation: number,
        first,
        second,
        remote_entities: conversation.remote_entity_count(),
    };

    // Output
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result, &master);
        }
    }

    Ok(())
}

fn print_text_output(result: &ScenarioResult, master: &Record) {
    println!("Conversation #{}", result.conversation);
    println!("  Entity id base: {}", result.first.metadata.entity_id_base);
    println!();
    print_batch("First drain", &result.first);
    print_batch("Second drain", &result.second);
    println!(
        "Client holds {} entities, master {} at {}",
        result.remote_entities,
        master.key(),
        master.last_modified()
    );
}

fn print_batch(title: &str, batch: &TransferBatch) {
    println!("{title}:");
    if batch.is_empty() {
        println!("  (empty)");
    }
    for delta in &batch.entities {
        println!("  + {} {}", delta.key, serde_json::Value::Object(delta.properties.clone()));
    }
    for key in &batch.deleted_entities {
        println!("  - {key}");
    }
    println!();
}
