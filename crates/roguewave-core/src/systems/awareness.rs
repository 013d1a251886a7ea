//! Awareness audio - barks and drones while the player is near

use crate::components::*;
use crate::events::{EventQueue, GameEvent};
use hecs::World;
use rand::Rng;

/// Emit bark one-shots and start or stop drone loops based on each agent's
/// cached distance to the target.
pub fn awareness_system(world: &mut World, events: &mut EventQueue, now: f32, rng: &mut impl Rng) {
    for (entity, (awareness, range, pose, profile, health)) in
        world.query_mut::<(&mut Awareness, &TargetRange, &Pose, &Profile, &Health)>()
    {
        if !health.alive {
            continue;
        }
        let audio = &profile.audio;
        let in_range = range.distance <= audio.max_audio_distance;

        match audio.awareness {
            AwarenessAudio::None => {}
            AwarenessAudio::Bark => {
                if !in_range || now <= awareness.next_bark || audio.bark_clips.is_empty() {
                    continue;
                }
                let clip = &audio.bark_clips[rng.gen_range(0..audio.bark_clips.len())];
                events.push(GameEvent::PlayOneShot {
                    clip: clip.clone(),
                    position: Some(pose.position),
                });
                awareness.next_bark = now + bark_interval(audio.bark_frequency, rng);
            }
            AwarenessAudio::Drone => {
                if in_range && !awareness.drone_playing {
                    let Some(clip) = &audio.drone_clip else {
                        continue;
                    };
                    events.push(GameEvent::PlayLooping { entity, clip: clip.clone() });
                    awareness.drone_playing = true;
                } else if !in_range && awareness.drone_playing {
                    events.push(GameEvent::StopLooping { entity });
                    awareness.drone_playing = false;
                }
            }
        }
    }
}

fn bark_interval((lo, hi): (f32, f32), rng: &mut impl Rng) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo.max(0.0)
    }
}
