//! Authentication commands — `padctl login`, `padctl cookie`.

use anyhow::{Context, Result, bail};
use padctl::credentials::CookieStore;
use padctl::errors::PadError;
use padctl::session::Session;

use crate::{Cli, CookieCommands};

pub async fn cmd_login(cli: &Cli, username: &str) -> Result<()> {
    let password = dialoguer::Password::new()
        .with_prompt(format!("Password for {username}"))
        .interact()
        .context("Failed to read password")?;

    let mut session = Session::new(cli.domain.clone())?;
    let userinfo = session.login(username, &password).await?;

    let store = CookieStore::new();
    store.save(&userinfo.cookie)?;
    println!("Logged in as {userinfo}");
    println!("Cookie saved to {}", store.path().display());
    Ok(())
}

pub async fn cmd_cookie(cli: &Cli, command: CookieCommands) -> Result<()> {
    let store = CookieStore::new();
    match command {
        CookieCommands::Show => match store.load() {
            Some(token) => println!("{token}"),
            None => return Err(PadError::MissingCookie.into()),
        },
        CookieCommands::Set { cookie } => {
            // Refuse to store a cookie the service does not recognise.
            let session = Session::new(cli.domain.clone())?;
            let userinfo = session.resolve_user(&cookie).await?;
            if !userinfo.logged_in || userinfo.username.is_empty() {
                bail!("Not logged in: the service rejected this cookie");
            }
            store.save(&cookie)?;
            println!("Cookie for {userinfo} saved to {}", store.path().display());
        }
        CookieCommands::Clear => {
            store.clear()?;
            println!("Cookie cleared from {}", store.path().display());
        }
    }
    Ok(())
}
