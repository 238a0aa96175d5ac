use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "PWEXPORT_PASSWORD";

/// Where the password comes from, in order of precedence.
pub enum PasswordSource {
    /// `PWEXPORT_PASSWORD="..." pwexport import ...`
    Env,
    /// `printf "%s" "$PW" | pwexport --password-stdin import --input backup.export`
    Stdin,
    /// Interactive prompt on the TTY.
    Prompt,
}

impl PasswordSource {
    pub fn detect(password_stdin: bool) -> Self {
        if std::env::var(PASSWORD_ENV).is_ok_and(|pw| !pw.is_empty()) {
            PasswordSource::Env
        } else if password_stdin {
            PasswordSource::Stdin
        } else {
            PasswordSource::Prompt
        }
    }
}

pub fn read_password(source: PasswordSource) -> Result<Zeroizing<String>> {
    match source {
        PasswordSource::Env => env_password(),
        PasswordSource::Stdin => stdin_password(),
        PasswordSource::Prompt => {
            ensure_terminal()?;
            let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
            if pw.is_empty() {
                bail!("No password provided");
            }
            Ok(pw)
        }
    }
}

/// Exports prompt twice so a typo does not lock the data away.
pub fn read_new_password_with_confirmation(source: PasswordSource) -> Result<Zeroizing<String>> {
    match source {
        PasswordSource::Env => env_password(),
        PasswordSource::Stdin => stdin_password(),
        PasswordSource::Prompt => {
            ensure_terminal()?;

            let pw1 = Zeroizing::new(rpassword::prompt_password("New password: ")?);
            let pw2 = Zeroizing::new(rpassword::prompt_password("Confirm password: ")?);

            if pw1.is_empty() {
                bail!("password cannot be empty");
            }

            if pw1 != pw2 {
                bail!("passwords do not match");
            }

            Ok(pw1)
        }
    }
}

fn ensure_terminal() -> Result<()> {
    if !io::stdin().is_terminal() {
        bail!("no terminal to prompt on; set {PASSWORD_ENV} or use --password-stdin");
    }
    Ok(())
}

fn env_password() -> Result<Zeroizing<String>> {
    match std::env::var(PASSWORD_ENV) {
        Ok(pw) if !pw.is_empty() => Ok(Zeroizing::new(pw)),
        _ => bail!("{PASSWORD_ENV} is not set"),
    }
}

fn stdin_password() -> Result<Zeroizing<String>> {
    let mut buf = Zeroizing::new(String::new());
    io::stdin().lock().read_line(&mut buf)?;
    trim_newline(&mut buf);

    if buf.is_empty() {
        bail!("No password provided");
    }

    Ok(buf)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
