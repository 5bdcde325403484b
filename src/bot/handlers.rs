use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{replies, JukeboxBot};
use crate::audio::SongbirdTransport;

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "ping" => reply(ctx, &command, replies::PONG, true).await?,
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        other => warn!("Comando desconocido ignorado: /{}", other),
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    let voice_channel_id = match user_voice_channel(ctx, guild_id, command.user.id) {
        VoiceLookup::InChannel(channel_id) => channel_id,
        VoiceLookup::NotInVoice => {
            return reply(ctx, command, replies::NOT_IN_VOICE, true).await;
        }
        VoiceLookup::GuildNotCached => {
            return reply(ctx, command, replies::GUILD_NOT_CACHED, true).await;
        }
    };

    // Defer la respuesta: resolver y descargar puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true)),
        )
        .await?;

    let engine = bot.jukebox.engine();
    if !engine.has_voice(guild_id) {
        match bot.join_voice_channel(ctx, guild_id, voice_channel_id).await {
            Ok(call) => {
                let transport = SongbirdTransport::attach(call).await;
                engine.on_voice_ready(guild_id, Arc::new(transport));
                edit(ctx, command, replies::JOINING_VOICE).await?;
            }
            Err(e) => {
                error!("❌ No se pudo entrar al canal de voz: {:?}", e);
                return edit(ctx, command, replies::JOIN_FAILED).await;
            }
        }
    }

    match bot.jukebox.play(guild_id, &query).await {
        Ok(outcome) => {
            edit(ctx, command, &replies::play_status(&outcome)).await?;

            if let Some(notice) = replies::queued_notice(&outcome) {
                command
                    .channel_id
                    .send_message(&ctx.http, CreateMessage::new().content(notice))
                    .await?;
            }
        }
        Err(e) => {
            warn!("⚠️ /play falló para '{}': {}", query, e);
            edit(ctx, command, &replies::play_error(&e)).await?;
        }
    }

    Ok(())
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let skipped = bot.jukebox.engine().request_skip(guild_id);
    reply(ctx, command, replies::skip(skipped), false).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    bot.jukebox.engine().request_stop(guild_id);

    if let Err(e) = bot.leave_voice_channel(ctx, guild_id).await {
        // no estar conectado no es un error para /stop
        warn!("No se pudo salir del canal de voz: {:?}", e);
    }

    reply(ctx, command, replies::STOPPED, false).await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let tracks = bot.jukebox.engine().snapshot_queue(guild_id);
    reply(ctx, command, &replies::queue_listing(&tracks), false).await
}

async fn reply(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn edit(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

enum VoiceLookup {
    InChannel(ChannelId),
    NotInVoice,
    GuildNotCached,
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> VoiceLookup {
    let Some(guild) = guild_id.to_guild_cached(&ctx.cache) else {
        return VoiceLookup::GuildNotCached;
    };

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .map_or(VoiceLookup::NotInVoice, VoiceLookup::InChannel)
}
