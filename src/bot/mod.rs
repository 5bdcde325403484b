//! # Bot Module
//!
//! Discord front end of the jukebox.
//!
//! - Slash command registration (`/play`, `/skip`, `/stop`, `/queue`)
//! - Voice connection management through songbird
//! - Stopping playback when the bot is disconnected from voice
//! - Dropping a guild's queue when the bot is removed from it
//!
//! The [`JukeboxBot`] struct implements Serenity's [`EventHandler`] trait and
//! hands every command to the [`Jukebox`] play pipeline or its engine.

use anyhow::Result;
use serenity::{
    all::{
        ChannelId, Context, EventHandler, Guild, GuildId, Interaction, Ready, UnavailableGuild,
        VoiceState,
    },
    async_trait,
};
use songbird::Call;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod replies;

use crate::{config::Config, jukebox::Jukebox};

pub struct JukeboxBot {
    config: Arc<Config>,
    pub jukebox: Arc<Jukebox>,
}

impl JukeboxBot {
    pub fn new(config: Arc<Config>, jukebox: Arc<Jukebox>) -> Self {
        Self { config, jukebox }
    }

    /// Registers slash commands with Discord.
    ///
    /// Per guild when `GUILD_ID` is configured (propagates in seconds),
    /// globally otherwise (can take up to an hour).
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Connects to a voice channel and returns the songbird call.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Discord context for API operations
    /// * `guild_id` - ID of the Discord server
    /// * `channel_id` - ID of the voice channel to join
    ///
    /// # Required Permissions
    ///
    /// - `Connect` - To join the voice channel
    /// - `Speak` - To play audio in the channel
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<Mutex<Call>>> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        match manager.join(guild_id, channel_id).await {
            Ok(call) => {
                info!("🔊 Conectado al canal de voz en guild {}", guild_id);
                Ok(call)
            }
            Err(e) => {
                error!("Error al obtener handler de voz: {:?}", e);
                Err(anyhow::anyhow!("Error al conectar al canal de voz"))
            }
        }
    }

    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        manager.remove(guild_id).await?;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Stops the guild's playback when the bot itself leaves voice.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        warn!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);
        self.jukebox.engine().request_stop(guild_id);
    }

    async fn guild_delete(&self, ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        // una caída de Discord no es una expulsión
        if incomplete.unavailable {
            return;
        }

        let guild_id = incomplete.id;
        info!("🚪 Bot eliminado del guild {}", guild_id);
        self.jukebox.engine().remove_guild(guild_id);

        if let Err(e) = self.leave_voice_channel(&ctx, guild_id).await {
            debug!("Sin llamada de voz que cerrar en guild {}: {:?}", guild_id, e);
        }
    }
}
