use std::path::PathBuf;

use konect_client::Credentials;

/// One line of user input.
#[derive(Debug, PartialEq)]
pub enum Command {
    Auth(Credentials),
    Logout,
    Rooms,
    Create {
        name: String,
        description: Option<String>,
    },
    Join(String),
    Upload(Vec<PathBuf>),
    /// Plain text: send it to the active room.
    Say(String),
    Quit,
}

impl Command {
    /// `Ok(None)` for blank lines; `Err` carries a usage hint.
    pub fn parse(line: &str) -> Result<Option<Self>, &'static str> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if !line.starts_with('/') {
            return Ok(Some(Self::Say(line.to_string())));
        }

        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match verb {
            "/login" => match args.as_slice() {
                [email, password] => Self::Auth(Credentials::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                }),
                _ => return Err("usage: /login <email> <password>"),
            },
            "/register" => match args.as_slice() {
                [username, email, password] => Self::Auth(Credentials::Register {
                    username: username.to_string(),
                    email: email.to_string(),
                    password: password.to_string(),
                }),
                _ => return Err("usage: /register <username> <email> <password>"),
            },
            "/logout" => Self::Logout,
            "/rooms" => Self::Rooms,
            "/create" => {
                let (name, description) = rest.split_once(' ').unwrap_or((rest, ""));
                if name.is_empty() {
                    return Err("usage: /create <name> [description]");
                }
                let description = description.trim();
                Self::Create {
                    name: name.to_string(),
                    description: (!description.is_empty()).then(|| description.to_string()),
                }
            }
            "/join" => match args.as_slice() {
                [target] => Self::Join(target.to_string()),
                _ => return Err("usage: /join <number|room id>"),
            },
            "/upload" => {
                if args.is_empty() {
                    return Err("usage: /upload <path>...");
                }
                Self::Upload(args.iter().map(PathBuf::from).collect())
            }
            "/quit" | "/exit" => Self::Quit,
            _ => return Err("commands: /login /register /logout /rooms /create /join /upload /quit"),
        };
        Ok(Some(command))
    }
}
