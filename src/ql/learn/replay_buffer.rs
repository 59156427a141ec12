use std::collections::VecDeque;

use crate::ql::prelude::Action;

/// Keeps the `max_buffer_len` most recent elements
pub struct RingBuffer<T> {
    max_buffer_len: usize,
    pub buffer: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(max_buffer_len: usize) -> Self {
        assert!(max_buffer_len > 0);
        Self {
            max_buffer_len,
            buffer: VecDeque::with_capacity(max_buffer_len),
        }
    }

    pub fn len(&self) -> usize { self.buffer.len() }

    pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

    pub fn add(&mut self, element: T) {
        if self.buffer.len() == self.max_buffer_len {
            self.buffer.pop_front();
        }
        self.buffer.push_back(element);
    }
}

/// Recent experience of the training loop: taken actions and returns of completed episodes
pub struct ReplayBuffer<A: Action> {
    actions: RingBuffer<A>,
    episode_rewards: RingBuffer<f32>,
}

impl<A: Action> ReplayBuffer<A> {
    pub fn new(action_history_len: usize, episode_reward_history_len: usize) -> Self {
        Self {
            actions: RingBuffer::new(action_history_len),
            episode_rewards: RingBuffer::new(episode_reward_history_len),
        }
    }

    pub fn add_action(&mut self, action: A) { self.actions.add(action) }

    pub fn add_episode_reward(&mut self, episode_reward: f32) { self.episode_rewards.add(episode_reward) }

    pub fn actions(&self) -> &RingBuffer<A> { &self.actions }

    pub fn episode_rewards(&self) -> &RingBuffer<f32> { &self.episode_rewards }

    /// mean return over the recent completed episodes; `None` before the first episode completed
    pub fn avg_episode_reward(&self) -> Option<f32> {
        let c = &self.episode_rewards.buffer;
        match c.is_empty() {
            true => None,
            false => Some(c.iter().sum::<f32>() / c.len() as f32),
        }
    }

    pub fn min_episode_reward(&self) -> Option<f32> {
        self.episode_rewards.buffer.iter().copied().reduce(f32::min)
    }
}

#[cfg(test)]
mod tests {
    use crate::environment::breakout::mechanics::GameAction;

    use super::*;

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let mut b = RingBuffer::new(3);
        for i in 0..5 {
            b.add(i);
        }
        assert_eq!(b.len(), 3);
        assert_eq!(b.buffer.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_episode_reward_statistics() {
        let mut r = ReplayBuffer::<GameAction>::new(10, 2);
        assert_eq!(r.avg_episode_reward(), None);
        assert_eq!(r.min_episode_reward(), None);

        r.add_episode_reward(-4.0);
        r.add_episode_reward(2.0);
        r.add_episode_reward(4.0);

        assert_eq!(r.avg_episode_reward(), Some(3.0));
        assert_eq!(r.min_episode_reward(), Some(2.0));
    }
}
