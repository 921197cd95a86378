use crate::{Error, Result};

/// A store command: a name followed by binary-safe arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Vec<u8>>,
}

impl Command {
    pub fn new(name: &str) -> Self {
        Self {
            args: vec![name.as_bytes().to_vec()],
        }
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(arg.as_ref().to_vec());
        self
    }

    /// Appends an integer argument in its decimal form.
    pub fn int_arg(self, arg: i64) -> Self {
        self.arg(arg.to_string())
    }

    /// Upper-cased command name.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).to_uppercase()
    }

    /// Arguments after the command name.
    pub fn params(&self) -> &[Vec<u8>] {
        &self.args[1..]
    }

    /// Name and arguments, as sent on the wire.
    pub fn parts(&self) -> &[Vec<u8>] {
        &self.args
    }

    /// Builds a command from raw wire parts. Returns `None` for an empty list.
    pub fn from_parts(parts: Vec<Vec<u8>>) -> Option<Self> {
        if parts.is_empty() {
            None
        } else {
            Some(Self { args: parts })
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// A successful reply from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Status(String),
    Integer(i64),
    Bulk(Vec<u8>),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn bulk(s: impl Into<String>) -> Self {
        Reply::Bulk(s.into().into_bytes())
    }

    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Converts a bulk or status reply into a string. Invalid UTF-8 is
    /// replaced, so binary payloads stay detectable by their content.
    pub fn into_string(self) -> Result<String> {
        match self {
            Reply::Bulk(b) => Ok(String::from_utf8_lossy(&b).into_owned()),
            Reply::Status(s) => Ok(s),
            Reply::Integer(i) => Ok(i.to_string()),
            other => Err(unexpected("string", &other)),
        }
    }

    /// Like [`Reply::into_string`] but maps `Nil` to `None`.
    pub fn into_opt_string(self) -> Result<Option<String>> {
        match self {
            Reply::Nil => Ok(None),
            other => other.into_string().map(Some),
        }
    }

    /// Raw bytes of a bulk or status reply, `None` for `Nil`. Nothing is
    /// decoded, so binary elements survive a read/write cycle.
    pub fn into_opt_bytes(self) -> Result<Option<Vec<u8>>> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Bulk(b) => Ok(Some(b)),
            Reply::Status(s) => Ok(Some(s.into_bytes())),
            other => Err(unexpected("bulk string", &other)),
        }
    }

    pub fn into_int(self) -> Result<i64> {
        match self {
            Reply::Integer(i) => Ok(i),
            Reply::Bulk(b) => {
                let s = String::from_utf8_lossy(&b);
                s.parse()
                    .map_err(|_| Error::Protocol(format!("expected integer, got {}", s)))
            }
            other => Err(unexpected("integer", &other)),
        }
    }

    pub fn into_bool(self) -> Result<bool> {
        self.into_int().map(|i| i != 0)
    }

    /// Converts an array reply into a list of strings. `Nil` is an empty list.
    pub fn into_strings(self) -> Result<Vec<String>> {
        match self {
            Reply::Array(items) => items.into_iter().map(Reply::into_string).collect(),
            Reply::Nil => Ok(Vec::new()),
            other => Err(unexpected("array", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &Reply) -> Error {
    Error::Protocol(format!("expected {} reply, got {:?}", expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = Command::new("lrange").arg("mylist").int_arg(0).int_arg(-1);
        assert_eq!(cmd.name(), "LRANGE");
        assert_eq!(cmd.params().len(), 3);
        assert_eq!(cmd.to_string(), "lrange mylist 0 -1");
    }

    #[test]
    fn test_reply_conversions() {
        assert_eq!(Reply::bulk("x").into_string().unwrap(), "x");
        assert_eq!(Reply::Integer(3).into_int().unwrap(), 3);
        assert_eq!(Reply::bulk("12").into_int().unwrap(), 12);
        assert!(Reply::Integer(1).into_bool().unwrap());
        assert_eq!(Reply::Nil.into_opt_string().unwrap(), None);
        assert_eq!(
            Reply::Array(vec![Reply::bulk("a"), Reply::bulk("b")])
                .into_strings()
                .unwrap(),
            vec!["a", "b"]
        );
        assert!(matches!(Reply::Nil.into_int(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let s = Reply::Bulk(vec![b'a', 0xff]).into_string().unwrap();
        assert_eq!(s, "a\u{fffd}");
    }

    #[test]
    fn test_opt_bytes_keep_invalid_utf8() {
        assert_eq!(
            Reply::Bulk(vec![0xff, 0x00]).into_opt_bytes().unwrap(),
            Some(vec![0xff, 0x00])
        );
        assert_eq!(Reply::Nil.into_opt_bytes().unwrap(), None);
        assert!(matches!(Reply::Integer(1).into_opt_bytes(), Err(Error::Protocol(_))));
    }
}
