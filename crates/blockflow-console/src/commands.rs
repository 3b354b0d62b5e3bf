//! Console command parsing.

use blockflow_core::{BlockflowError, Inputs, NewBlock, Result};

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Select a flow by id.
    Select(String),
    /// Clear the selection.
    Deselect,
    /// Create a flow from a prompt and select it.
    Prompt(String),
    /// Create a block from `name | url | actions`.
    NewBlock(NewBlock),
    /// Show the block list.
    Blocks,
    /// Show the flow list.
    Flows,
    /// Re-fetch both lists now.
    Refresh,
    /// Show flows waiting for input.
    Pending,
    /// Send inputs to the selected flow.
    Continue(Inputs),
    /// Run a flow with initial inputs.
    Execute { id: String, inputs: Inputs },
    /// Load top stories and the quote.
    Dashboard,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  blocks                          list blocks
  flows                           list flows
  refresh                         re-fetch blocks and flows
  pending                         flows waiting for input
  select <flow-id>                select a flow and follow it
  deselect                        clear the selection
  prompt <text>                   create a flow from a prompt
  continue <json>                 send inputs to the selected flow
  execute <flow-id> [json]        run a flow
  new-block <name> | <url> | <actions>
                                  create a block (actions comma-separated)
  dashboard                       top stories and stock quote
  help                            this text
  quit                            exit";

impl Command {
    /// Parse a line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "select" => match rest {
                "" => return Err(usage("select <flow-id>")),
                id => Command::Select(id.to_string()),
            },
            "deselect" => Command::Deselect,
            "prompt" => Command::Prompt(rest.to_string()),
            "new-block" => Command::NewBlock(parse_new_block(rest)?),
            "blocks" => Command::Blocks,
            "flows" => Command::Flows,
            "refresh" => Command::Refresh,
            "pending" => Command::Pending,
            "continue" => match rest {
                "" => return Err(usage("continue <json>")),
                json => Command::Continue(parse_inputs(json)?),
            },
            "execute" => {
                let (id, json) = match rest.split_once(char::is_whitespace) {
                    Some((id, json)) => (id, json.trim()),
                    None => (rest, ""),
                };
                if id.is_empty() {
                    return Err(usage("execute <flow-id> [json]"));
                }
                let inputs = if json.is_empty() {
                    Inputs::new()
                } else {
                    parse_inputs(json)?
                };
                Command::Execute {
                    id: id.to_string(),
                    inputs,
                }
            }
            "dashboard" => Command::Dashboard,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => {
                return Err(BlockflowError::Validation(format!(
                    "unknown command `{other}`, type `help`"
                )))
            }
        };

        Ok(Some(command))
    }
}

fn usage(text: &str) -> BlockflowError {
    BlockflowError::Validation(format!("usage: {text}"))
}

/// `name | url | actions`; field contents are checked when the block is created.
fn parse_new_block(rest: &str) -> Result<NewBlock> {
    let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
    match fields.as_slice() {
        [name, url, actions] => Ok(NewBlock::new(*name, *url, *actions)),
        _ => Err(usage("new-block <name> | <url> | <actions>")),
    }
}

/// Inputs must be a JSON object.
pub fn parse_inputs(raw: &str) -> Result<Inputs> {
    match serde_json::from_str(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(BlockflowError::Validation(
            "inputs must be a JSON object".to_string(),
        )),
        Err(e) => Err(BlockflowError::Validation(format!("invalid JSON: {e}"))),
    }
}
