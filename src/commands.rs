use std::collections::HashMap;
use std::time::Duration;

use crate::errors::{CommandError, ProtocolError};
use crate::resp::RespValue;
use crate::store::Store;

/// One decoded client request: uppercased command name plus its arguments
/// in order. Built once per request array, consumed by the dispatcher.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Convenience entry point: turn a decoded top-level array of bulk
    /// strings into a command. Anything else a client sends is a protocol
    /// violation, not a command error.
    pub fn from_value(value: RespValue) -> Result<Self, ProtocolError> {
        let items = match value {
            RespValue::Array(items) if !items.is_empty() => items,
            _ => {
                return Err(ProtocolError::Malformed(
                    "expected a non-empty array of bulk strings".into(),
                ))
            }
        };

        let mut tokens = Vec::with_capacity(items.len());
        for item in items {
            match item {
                RespValue::BulkString(s) => tokens.push(s),
                _ => {
                    return Err(ProtocolError::Malformed(
                        "request array may only hold bulk strings".into(),
                    ))
                }
            }
        }

        let name = tokens.remove(0).to_ascii_uppercase();
        Ok(Self { name, args: tokens })
    }
}

type Handler = fn(&mut Store, &Command) -> Result<RespValue, CommandError>;

/// Arity bounds plus behavior for one command. Adding a command means adding
/// one table entry, not another branch in a match chain.
struct CommandSpec {
    min_args: usize,
    max_args: Option<usize>,
    run: Handler,
}

/// Maps command names to their handlers. Stateless between requests; the
/// store it operates on is handed in per dispatch.
pub struct Dispatcher {
    table: HashMap<&'static str, CommandSpec>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        let mut register = |name, min_args, max_args, run| {
            table.insert(name, CommandSpec { min_args, max_args, run });
        };

        register("PING", 0, Some(1), ping as Handler);
        // SET checks its own tail: everything past `key value` must be the
        // EX form, and a wrong shape there is a syntax error, not arity.
        register("SET", 2, None, set);
        register("GET", 1, Some(1), get);
        register("TTL", 1, Some(1), ttl);
        register("DEL", 1, None, del);
        register("EXPIRE", 2, Some(2), expire);
        // Stub so client libraries that open with CLIENT SETINFO get on
        // with their lives.
        register("CLIENT", 0, None, client);

        Self { table }
    }

    /// Run one command against the store and produce its reply frame. Every
    /// `CommandError` becomes an error reply here; the caller only has to
    /// write whatever comes back.
    pub fn dispatch(&self, store: &mut Store, cmd: &Command) -> RespValue {
        match self.try_dispatch(store, cmd) {
            Ok(reply) => reply,
            Err(e) => RespValue::Error(e.to_string()),
        }
    }

    fn try_dispatch(&self, store: &mut Store, cmd: &Command) -> Result<RespValue, CommandError> {
        let spec = self
            .table
            .get(cmd.name.as_str())
            .ok_or_else(|| CommandError::Unknown {
                name: cmd.name.clone(),
                args: cmd.args.join(" "),
            })?;

        let arity_ok = cmd.args.len() >= spec.min_args
            && spec.max_args.map_or(true, |max| cmd.args.len() <= max);
        if !arity_ok {
            return Err(CommandError::WrongArity(cmd.name.to_ascii_lowercase()));
        }

        (spec.run)(store, cmd)
    }
}

fn ping(_store: &mut Store, cmd: &Command) -> Result<RespValue, CommandError> {
    match cmd.args.first() {
        None => Ok(RespValue::SimpleString("PONG".into())),
        Some(payload) => Ok(RespValue::BulkString(payload.clone())),
    }
}

/// SET key value [EX seconds]. Only the trailing EX form is recognized;
/// anything else after the value is a syntax error.
fn set(store: &mut Store, cmd: &Command) -> Result<RespValue, CommandError> {
    let key = &cmd.args[0];
    let value = &cmd.args[1];

    let ttl = match cmd.args.len() {
        2 => None,
        4 if cmd.args[2].eq_ignore_ascii_case("EX") => {
            let seconds: i64 = cmd.args[3].parse().map_err(|_| CommandError::Syntax)?;
            if seconds > 0 {
                Some(Duration::from_millis(seconds as u64 * 1000))
            } else {
                None
            }
        }
        _ => return Err(CommandError::Syntax),
    };

    store.put(key.as_str(), value.as_str(), ttl);
    Ok(RespValue::SimpleString("OK".into()))
}

fn get(store: &mut Store, cmd: &Command) -> Result<RespValue, CommandError> {
    match store.get(&cmd.args[0]) {
        Some(entry) => Ok(RespValue::BulkString(entry.value.clone())),
        None => Ok(RespValue::NullBulkString),
    }
}

fn ttl(store: &mut Store, cmd: &Command) -> Result<RespValue, CommandError> {
    Ok(RespValue::Integer(store.ttl(&cmd.args[0])))
}

fn del(store: &mut Store, cmd: &Command) -> Result<RespValue, CommandError> {
    let removed = cmd.args.iter().filter(|key| store.delete(key)).count();
    Ok(RespValue::Integer(removed as i64))
}

fn expire(store: &mut Store, cmd: &Command) -> Result<RespValue, CommandError> {
    let key = &cmd.args[0];
    let seconds: i64 = cmd.args[1].parse().map_err(|_| CommandError::NotInteger)?;

    if seconds <= 0 {
        // A deadline in the past makes the key immediately absent.
        let existed = store.delete(key);
        return Ok(RespValue::Integer(existed as i64));
    }

    let touched = store.touch_expiry(key, Duration::from_secs(seconds as u64));
    Ok(RespValue::Integer(touched as i64))
}

fn client(_store: &mut Store, _cmd: &Command) -> Result<RespValue, CommandError> {
    Ok(RespValue::SimpleString("OK".into()))
}
