//! Interactive relation entry.
//!
//! Lists entities with 1-based numbers, asks for a source and a target, then
//! for the relation metadata. Bad input is reported and asked again; end of
//! input cancels the selection.

use std::io::{BufRead, Write};

use tracing::debug;

use crate::entity::Entity;
use crate::error::{ExecutionError, KbResult, ValidationError};
use crate::operations::write::{RelationWriter, WriteReport};
use crate::relation::Relation;
use crate::storage::KnowledgeStore;

/// Context recorded on manually entered relations when none is given.
pub const MANUAL_CONTEXT: &str = "manual";

fn prompt_err(err: &std::io::Error) -> ExecutionError {
    ExecutionError::Prompt {
        message: err.to_string(),
    }
}

/// Parses a 1-based menu choice.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidInput`] for non-numeric or out-of-range input.
///
/// # Examples
///
/// ```
/// use kbgraph::operations::parse_choice;
///
/// assert_eq!(parse_choice(" 2 ", 3).unwrap(), 1);
/// assert!(parse_choice("0", 3).is_err());
/// assert!(parse_choice("x", 3).is_err());
/// ```
pub fn parse_choice(raw: &str, len: usize) -> Result<usize, ValidationError> {
    let raw = raw.trim();
    let n: usize = raw.parse().map_err(|_| ValidationError::InvalidInput {
        reason: format!("'{raw}' is not a number"),
    })?;
    if n == 0 || n > len {
        return Err(ValidationError::InvalidInput {
            reason: format!("{n} is out of range 1-{len}"),
        });
    }
    Ok(n - 1)
}

/// Line-oriented prompt over any reader and writer.
pub struct Selector<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Selector<R, W> {
    /// Creates a selector.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Consumes the selector and returns its writer.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Writes `prompt` and reads one trimmed line. `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>, ExecutionError> {
        write!(self.output, "{prompt}").map_err(|e| prompt_err(&e))?;
        self.output.flush().map_err(|e| prompt_err(&e))?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(|e| prompt_err(&e))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, message: &str) -> Result<(), ExecutionError> {
        writeln!(self.output, "{message}").map_err(|e| prompt_err(&e))
    }

    /// Asks until a valid index is given, or returns `None` at end of input.
    fn choose(
        &mut self,
        prompt: &str,
        entities: &[Entity],
    ) -> Result<Option<usize>, ExecutionError> {
        loop {
            let Some(raw) = self.ask(prompt)? else {
                return Ok(None);
            };
            match parse_choice(&raw, entities.len()) {
                Ok(index) => return Ok(Some(index)),
                Err(err) => {
                    debug!(%err, "re-prompting");
                    self.say(&format!("{err}. Try again."))?;
                }
            }
        }
    }

    /// Asks for a required, non-empty value.
    fn ask_required(&mut self, prompt: &str) -> Result<Option<String>, ExecutionError> {
        loop {
            match self.ask(prompt)? {
                None => return Ok(None),
                Some(value) if value.is_empty() => self.say("A value is required.")?,
                Some(value) => return Ok(Some(value)),
            }
        }
    }

    /// Asks for an optional value, falling back to `default` when left blank.
    fn ask_or(&mut self, prompt: &str, default: &str) -> Result<Option<String>, ExecutionError> {
        Ok(self
            .ask(&format!("{prompt} [{default}]: "))?
            .map(|v| if v.is_empty() { default.to_string() } else { v }))
    }

    /// Walks the user through picking two entities and describing the relation.
    ///
    /// Returns `Ok(None)` if input ends before the relation is complete.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidInput`] if there are no entities to
    /// choose from, and a prompt error if the terminal cannot be read or written.
    pub fn select_relation(&mut self, entities: &[Entity]) -> KbResult<Option<Relation>> {
        if entities.is_empty() {
            return Err(ValidationError::InvalidInput {
                reason: "no entities to link".to_string(),
            }
            .into());
        }

        for (i, entity) in entities.iter().enumerate() {
            self.say(&format!(
                "{:>4}. {} ({}) [id {}]",
                i + 1,
                entity.title,
                entity.entity_type,
                entity.id
            ))?;
        }

        let Some(from) = self.choose("Source entity number: ", entities)? else {
            return Ok(None);
        };
        let Some(to) = self.choose("Target entity number: ", entities)? else {
            return Ok(None);
        };
        let Some(relation_type) = self.ask_required("Relation type: ")? else {
            return Ok(None);
        };
        let Some(to_name) = self.ask_or("Label", &entities[to].title)? else {
            return Ok(None);
        };
        let Some(context) = self.ask_or("Context", MANUAL_CONTEXT)? else {
            return Ok(None);
        };

        Ok(Some(Relation::new(
            entities[from].id,
            entities[to].id,
            relation_type,
            to_name,
            context,
        )))
    }
}

/// Lists the store's entities, lets the user describe one relation, and writes it.
///
/// Returns `Ok(None)` if the user cancelled.
///
/// # Errors
///
/// Propagates selection and storage errors.
pub fn link_interactively<R: BufRead, W: Write>(
    store: &mut dyn KnowledgeStore,
    selector: &mut Selector<R, W>,
) -> KbResult<Option<WriteReport>> {
    let entities = store.begin()?.list_entities()?;
    let Some(relation) = selector.select_relation(&entities)? else {
        return Ok(None);
    };
    let report = RelationWriter::new(store).write(&[relation])?;
    Ok(Some(report))
}
